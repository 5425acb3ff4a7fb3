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

//! Resolution of the synthesis parameters of a single voice.
//!
//! A voice is built from a sample, optionally the instrument zone that plays it and
//! optionally the preset zone that plays that instrument. Zone attributes shadow the
//! attributes of their global zone; instrument amounts replace generator defaults and
//! preset amounts are added on top.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::modulated::ModulatedParameter;
use crate::soundfont::{
    seconds_to_timecents, Attribute, AttributeValue, ElementId, ElementKind, Generator,
    ModulationContext, Modulator, SampleLink, SoundfontStore,
};

/// Coarse offsets are expressed in blocks of this many frames.
const COARSE_OFFSET_FRAMES: i64 = 32768;

/// Release time of a raw sample preview, in seconds.
const PREVIEW_RELEASE_SECONDS: f64 = 0.2;

/// Pan applied to the left or right channel of a stereo sample preview, in 0.1%.
const PREVIEW_STEREO_PAN: i16 = 500;

/// A sample position derived from the sample and its offset generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// First frame played.
    Start,
    /// Number of frames played from the beginning of the sample.
    Length,
    LoopStart,
    LoopEnd,
}

/// Which tier of the hierarchy a zone belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tier {
    Instrument,
    Preset,
}

/// The resolved synthesis parameters of one voice.
#[derive(Clone, Debug)]
pub struct VoiceParams {
    parameters: HashMap<Generator, ModulatedParameter>,
    modulators: Vec<Modulator>,
    sample_fine_tune: i32,
    sample_length: i64,
    sample_loop_start: i64,
    sample_loop_end: i64,
    preset_number: i32,
}

impl VoiceParams {
    /// Resolves the parameters of a voice. `preset_zone` and `instrument_zone` are `None` when
    /// previewing an instrument or a sample directly.
    pub fn new(
        store: &dyn SoundfontStore,
        preset_zone: Option<ElementId>,
        instrument_zone: Option<ElementId>,
        sample: ElementId,
    ) -> VoiceParams {
        let mut params = VoiceParams {
            parameters: Generator::ALL
                .iter()
                .map(|generator| (*generator, ModulatedParameter::new(*generator)))
                .collect(),
            modulators: Vec::new(),
            sample_fine_tune: 0,
            sample_length: 0,
            sample_loop_start: 0,
            sample_loop_end: 0,
            preset_number: -1,
        };

        params.read_sample(store, sample);

        if let Some(instrument_zone) = instrument_zone {
            params.read_zone(store, instrument_zone, Tier::Instrument);
        }

        if let Some(preset_zone) = preset_zone {
            if params.read_zone(store, preset_zone, Tier::Preset) {
                if let Some(preset) = preset_zone.parent() {
                    params.preset_number = store
                        .get(preset, Attribute::PresetNumber)
                        .map_or(0, |value| value.word() as i32);
                }
            }
        }

        params
    }

    fn read_sample(&mut self, store: &dyn SoundfontStore, sample: ElementId) {
        if sample.kind() != ElementKind::Sample {
            warn!(element = %sample, "Voice sample is not a sample, ignoring it.");
            return;
        }

        if let Some(pitch) = store.get(sample, Attribute::OriginalPitch) {
            self.parameter_mut(Generator::OverridingRootKey)
                .init_inst(pitch);
        }
        let read = |attribute| store.get(sample, attribute).unwrap_or_default();
        self.sample_fine_tune = read(Attribute::PitchCorrection).char() as i32;
        self.sample_length = read(Attribute::Length).dword() as i64;
        self.sample_loop_start = read(Attribute::LoopStart).dword() as i64;
        self.sample_loop_end = read(Attribute::LoopEnd).dword() as i64;
    }

    /// Applies the attributes of a zone and then the attributes of its global zone that the
    /// zone does not set itself. Returns false if the zone is not of the expected kind.
    fn read_zone(&mut self, store: &dyn SoundfontStore, zone: ElementId, tier: Tier) -> bool {
        let expected = match tier {
            Tier::Instrument => ElementKind::InstrumentZone,
            Tier::Preset => ElementKind::PresetZone,
        };
        if zone.kind() != expected {
            warn!(element = %zone, ?tier, "Zone has an unexpected kind, ignoring it.");
            return false;
        }

        let zone_attributes = store.get_all_attributes(zone);
        for (attribute, value) in zone_attributes.iter() {
            self.init(tier, *attribute, *value);
        }

        let zone_modulators = store.modulators(zone);
        let mut global_modulators = Vec::new();

        if let Some(global) = zone.parent() {
            for (attribute, value) in store.get_all_attributes(global) {
                if !zone_attributes.iter().any(|(a, _)| *a == attribute) {
                    self.init(tier, attribute, value);
                }
            }

            global_modulators = store
                .modulators(global)
                .into_iter()
                .filter(|global| !zone_modulators.iter().any(|m| m.is_identical(global)))
                .collect();
        }

        // Instrument-level modulators and preset-level modulators both add to the generator.
        self.modulators.extend(zone_modulators);
        self.modulators.extend(global_modulators);

        debug!(element = %zone, ?tier, "Read zone attributes.");
        true
    }

    fn init(&mut self, tier: Tier, attribute: Attribute, value: AttributeValue) {
        if let Attribute::Generator(generator) = attribute {
            let parameter = self.parameter_mut(generator);
            match tier {
                Tier::Instrument => parameter.init_inst(value),
                Tier::Preset => parameter.init_prst(value),
            }
        }
    }

    /// Applies the per-voice defaults of a raw sample preview: playing the same key again
    /// cuts the previous voice, the release is short and stereo channels are hard panned.
    pub fn prepare_for_sample(&mut self, key: i32, link: SampleLink) {
        // A key of -1 wraps to class 65535.
        self.parameter_mut(Generator::ExclusiveClass)
            .init_inst(AttributeValue::from_word(key as u16));

        let release = seconds_to_timecents(PREVIEW_RELEASE_SECONDS).round() as i16;
        self.parameter_mut(Generator::ReleaseVolEnv)
            .init_inst(AttributeValue::from_short(release));

        let pan = match link {
            SampleLink::Left | SampleLink::RomLeft => -PREVIEW_STEREO_PAN,
            SampleLink::Right | SampleLink::RomRight => PREVIEW_STEREO_PAN,
            _ => 0,
        };
        self.parameter_mut(Generator::Pan)
            .init_inst(AttributeValue::from_short(pan));
    }

    /// Overrides the pan, in percent (-50 is hard left).
    pub fn set_pan(&mut self, pan: f64) {
        self.parameter_mut(Generator::Pan)
            .init_inst(AttributeValue::from_short((pan * 10.0).round() as i16));
    }

    /// Overrides the loop mode (soundfont sample modes).
    pub fn set_loop_mode(&mut self, mode: u16) {
        self.parameter_mut(Generator::SampleModes)
            .init_inst(AttributeValue::from_word(mode));
    }

    /// Overrides the loop start of the sample, in frames.
    pub fn set_loop_start(&mut self, frame: u32) {
        self.sample_loop_start = frame as i64;
    }

    /// Overrides the loop end of the sample, in frames.
    pub fn set_loop_end(&mut self, frame: u32) {
        self.sample_loop_end = frame as i64;
    }

    /// Overrides the fine tune generator, in cents. The sample pitch correction still applies.
    pub fn set_fine_tune(&mut self, cents: i16) {
        self.parameter_mut(Generator::FineTune)
            .init_inst(AttributeValue::from_short(cents));
    }

    /// Recomputes the modulator contributions for the given real-time inputs.
    pub fn apply_modulators(&mut self, context: &ModulationContext) {
        for parameter in self.parameters.values_mut() {
            parameter.clear_modulation();
        }
        let contributions: Vec<(Generator, f64)> = self
            .modulators
            .iter()
            .map(|modulator| (modulator.destination, modulator.evaluate(context)))
            .collect();
        for (generator, amount) in contributions {
            self.parameter_mut(generator).add_modulation(amount);
        }
    }

    /// Returns the modulators gathered from the zones of this voice.
    pub fn modulators(&self) -> &[Modulator] {
        &self.modulators
    }

    /// Returns the resolved value of a generator in its real unit (seconds, Hz, dB, percent).
    pub fn get_double(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::Generator(generator) => self.parameter(generator).get_real_value(),
            other => {
                warn!(attribute = %other, "Attribute is not a voice parameter.");
                0.0
            }
        }
    }

    /// Returns the resolved amount of a generator. The fine tune includes the sample pitch
    /// correction; the preset number is -1 when the voice is not played through a preset.
    pub fn get_integer(&self, attribute: Attribute) -> i32 {
        match attribute {
            Attribute::Generator(Generator::FineTune) => {
                self.sample_fine_tune + self.parameter(Generator::FineTune).get_int_value()
            }
            Attribute::Generator(generator) => self.parameter(generator).get_int_value(),
            Attribute::PresetNumber => self.preset_number,
            other => {
                warn!(attribute = %other, "Attribute is not a voice parameter.");
                0
            }
        }
    }

    /// Returns a sample position with its fine and coarse offsets applied, clamped to the
    /// sample. A positive end offset never extends the sample.
    pub fn get_position(&self, position: Position) -> u32 {
        match position {
            Position::Start => {
                let offset = self.offset(
                    Generator::StartAddrsOffset,
                    Generator::StartAddrsCoarseOffset,
                );
                self.clamp_to_length(offset)
            }
            Position::Length => {
                let offset =
                    self.offset(Generator::EndAddrsOffset, Generator::EndAddrsCoarseOffset);
                if self.sample_length + offset < 0 {
                    0
                } else if offset > 0 {
                    self.sample_length as u32
                } else {
                    (self.sample_length + offset) as u32
                }
            }
            Position::LoopStart => {
                let offset = self.offset(
                    Generator::StartloopAddrsOffset,
                    Generator::StartloopAddrsCoarseOffset,
                );
                self.clamp_to_length(self.sample_loop_start + offset)
            }
            Position::LoopEnd => {
                let offset = self.offset(
                    Generator::EndloopAddrsOffset,
                    Generator::EndloopAddrsCoarseOffset,
                );
                self.clamp_to_length(self.sample_loop_end + offset)
            }
        }
    }

    fn offset(&self, fine: Generator, coarse: Generator) -> i64 {
        self.parameter(fine).get_int_value() as i64
            + COARSE_OFFSET_FRAMES * self.parameter(coarse).get_int_value() as i64
    }

    fn clamp_to_length(&self, frame: i64) -> u32 {
        if frame < 0 {
            0
        } else {
            (frame.min(u32::MAX as i64) as u32).min(self.get_position(Position::Length))
        }
    }

    fn parameter(&self, generator: Generator) -> &ModulatedParameter {
        &self.parameters[&generator]
    }

    fn parameter_mut(&mut self, generator: Generator) -> &mut ModulatedParameter {
        self.parameters
            .entry(generator)
            .or_insert_with(|| ModulatedParameter::new(generator))
    }
}
