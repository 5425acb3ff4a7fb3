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

//! Modulators route a real-time control source to a generator.

use super::generator::Generator;

/// MIDI controller value the modulation context reports before any controller is received.
const DEFAULT_CONTROLLERS: [(u8, u8); 3] = [(7, 100), (10, 64), (11, 127)];

/// Centre value of the 14-bit pitch wheel.
const PITCH_WHEEL_CENTER: u16 = 8192;

/// The controller feeding a modulator source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerSource {
    /// Constant full-scale input.
    NoController,
    NoteOnVelocity,
    NoteOnKey,
    PolyPressure,
    ChannelPressure,
    PitchWheel,
    PitchWheelSensitivity,
    /// A MIDI continuous controller.
    Midi(u8),
}

/// The shape applied to a normalized source value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Concave,
    Convex,
    Switch,
}

/// A modulator source: a controller and how its value is mapped to [0, 1] or [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModulatorSource {
    pub controller: ControllerSource,
    pub curve: Curve,
    /// Maps to [-1, 1] instead of [0, 1].
    pub bipolar: bool,
    /// Maps from max to min instead of min to max.
    pub descending: bool,
}

impl ModulatorSource {
    /// A source that always reads 1.
    pub const NONE: ModulatorSource = ModulatorSource {
        controller: ControllerSource::NoController,
        curve: Curve::Linear,
        bipolar: false,
        descending: false,
    };

    /// A unipolar, ascending, linear source.
    pub fn linear(controller: ControllerSource) -> ModulatorSource {
        ModulatorSource {
            controller,
            ..ModulatorSource::NONE
        }
    }

    /// Reads the mapped value of this source from the context.
    pub fn value(&self, context: &ModulationContext) -> f64 {
        let normalized = match self.controller {
            ControllerSource::NoController => return 1.0,
            ControllerSource::NoteOnVelocity => context.velocity as f64 / 127.0,
            ControllerSource::NoteOnKey => context.key as f64 / 127.0,
            ControllerSource::PolyPressure => context.poly_pressure as f64 / 127.0,
            ControllerSource::ChannelPressure => context.channel_pressure as f64 / 127.0,
            ControllerSource::PitchWheel => context.pitch_wheel as f64 / 16383.0,
            ControllerSource::PitchWheelSensitivity => context.bend_sensitivity / 127.0,
            ControllerSource::Midi(number) => context.controller(number) as f64 / 127.0,
        };

        let x = normalized.clamp(0.0, 1.0);
        let x = if self.descending { 1.0 - x } else { x };
        let shaped = match self.curve {
            Curve::Linear => x,
            Curve::Concave => concave(x),
            Curve::Convex => 1.0 - concave(1.0 - x),
            Curve::Switch => {
                if x >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        };

        if self.bipolar {
            2.0 * shaped - 1.0
        } else {
            shaped
        }
    }
}

/// The soundfont concave curve: -20/96 * log10((1 - x)^2), saturating at 1.
fn concave(x: f64) -> f64 {
    if x >= 1.0 {
        return 1.0;
    }
    (-(40.0 / 96.0) * (1.0 - x).log10()).clamp(0.0, 1.0)
}

/// The transform applied to the modulator output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    Linear,
    Absolute,
}

/// A modulator attached to a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulator {
    pub source: ModulatorSource,
    pub destination: Generator,
    pub amount: i16,
    pub amount_source: ModulatorSource,
    pub transform: Transform,
}

impl Modulator {
    /// Two modulators are identical when they share sources and destination. A local zone
    /// modulator replaces an identical global one.
    pub fn is_identical(&self, other: &Modulator) -> bool {
        self.source == other.source
            && self.destination == other.destination
            && self.amount_source == other.amount_source
    }

    /// Computes the amount this modulator adds to its destination generator.
    pub fn evaluate(&self, context: &ModulationContext) -> f64 {
        let output = self.amount as f64
            * self.source.value(context)
            * self.amount_source.value(context);
        match self.transform {
            Transform::Linear => output,
            Transform::Absolute => output.abs(),
        }
    }
}

/// A snapshot of the real-time inputs modulators read from.
#[derive(Clone, Debug, PartialEq)]
pub struct ModulationContext {
    pub key: u8,
    pub velocity: u8,
    pub poly_pressure: u8,
    pub channel_pressure: u8,
    /// 14-bit pitch wheel value, 8192 being the centre.
    pub pitch_wheel: u16,
    /// Pitch bend range, in semitones.
    pub bend_sensitivity: f64,
    controllers: [u8; 128],
}

impl ModulationContext {
    /// Creates a context for a key press with MIDI power-on controller values.
    pub fn new(key: u8, velocity: u8) -> ModulationContext {
        let mut controllers = [0; 128];
        for (number, value) in DEFAULT_CONTROLLERS {
            controllers[number as usize] = value;
        }

        ModulationContext {
            key,
            velocity,
            poly_pressure: 0,
            channel_pressure: 0,
            pitch_wheel: PITCH_WHEEL_CENTER,
            bend_sensitivity: 2.0,
            controllers,
        }
    }

    /// Returns the value of a MIDI controller.
    pub fn controller(&self, number: u8) -> u8 {
        self.controllers[(number & 0x7F) as usize]
    }

    /// Sets the value of a MIDI controller.
    pub fn set_controller(&mut self, number: u8, value: u8) {
        self.controllers[(number & 0x7F) as usize] = value & 0x7F;
    }
}
