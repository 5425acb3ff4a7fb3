// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::soundfont::{AttributeValue, Generator, PresetPolicy};

/// One generator of a voice, with its instrument-level and preset-level amounts.
#[derive(Clone, Debug, PartialEq)]
pub struct ModulatedParameter {
    generator: Generator,
    instrument: Option<i32>,
    preset: Option<i32>,
    modulation: f64,
}

impl ModulatedParameter {
    /// Creates an unset parameter for the given generator.
    pub fn new(generator: Generator) -> ModulatedParameter {
        ModulatedParameter {
            generator,
            instrument: None,
            preset: None,
            modulation: 0.0,
        }
    }

    /// Returns the generator of this parameter.
    pub fn generator(&self) -> Generator {
        self.generator
    }

    /// Sets the instrument-level amount, replacing the default.
    pub fn init_inst(&mut self, value: AttributeValue) {
        self.instrument = Some(self.decode(value));
    }

    /// Sets the preset-level amount.
    pub fn init_prst(&mut self, value: AttributeValue) {
        self.preset = Some(self.decode(value));
    }

    /// Returns true if either tier set this parameter.
    pub fn is_set(&self) -> bool {
        self.instrument.is_some() || self.preset.is_some()
    }

    /// Adds a modulator contribution, in generator units.
    pub fn add_modulation(&mut self, amount: f64) {
        self.modulation += amount;
    }

    /// Removes every modulator contribution.
    pub fn clear_modulation(&mut self) {
        self.modulation = 0.0;
    }

    /// Returns the resolved amount in generator units, clamped to the legal range.
    pub fn amount(&self) -> f64 {
        let spec = self.generator.spec();
        let mut amount = self.instrument.unwrap_or(spec.default) as f64;
        if let (PresetPolicy::Additive, Some(preset)) = (spec.preset, self.preset) {
            amount += preset as f64;
        }
        (amount + self.modulation).clamp(spec.min as f64, spec.max as f64)
    }

    /// Returns the resolved amount converted to the generator's real unit.
    pub fn get_real_value(&self) -> f64 {
        self.generator.spec().unit.to_real(self.amount())
    }

    /// Returns the resolved amount rounded to an integer, without unit conversion.
    pub fn get_int_value(&self) -> i32 {
        self.amount().round() as i32
    }

    fn decode(&self, value: AttributeValue) -> i32 {
        if self.generator.spec().signed {
            value.short() as i32
        } else {
            value.word() as i32
        }
    }
}
