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
use tracing::{debug, warn};

use super::params::VoiceParams;
use crate::soundfont::{Attribute, ElementId, SampleLink, SoundfontStore};

/// Builds the voices triggered by a key press on a sample, an instrument or a preset. Playing a
/// single zone only considers that zone.
pub fn select_voices(
    store: &dyn SoundfontStore,
    element: ElementId,
    key: u8,
    velocity: u8,
) -> Vec<VoiceParams> {
    let voices = match element {
        ElementId::Sample { .. } => {
            let link = store
                .get(element, Attribute::SampleLink)
                .map_or(SampleLink::Mono, |value| SampleLink::from_word(value.word()));
            let mut params = VoiceParams::new(store, None, None, element);
            params.prepare_for_sample(key as i32, link);
            vec![params]
        }
        ElementId::Instrument { .. } => store
            .children(element)
            .into_iter()
            .flat_map(|zone| instrument_zone_voices(store, None, zone, key, velocity))
            .collect(),
        ElementId::InstrumentZone { .. } => {
            instrument_zone_voices(store, None, element, key, velocity)
        }
        ElementId::Preset { .. } => store
            .children(element)
            .into_iter()
            .flat_map(|zone| preset_zone_voices(store, zone, key, velocity))
            .collect(),
        ElementId::PresetZone { .. } => preset_zone_voices(store, element, key, velocity),
    };

    debug!(
        element = %element,
        key,
        velocity,
        voices = voices.len(),
        "Selected voices."
    );
    voices
}

fn preset_zone_voices(
    store: &dyn SoundfontStore,
    preset_zone: ElementId,
    key: u8,
    velocity: u8,
) -> Vec<VoiceParams> {
    if !in_ranges(store, preset_zone, key, velocity) {
        return Vec::new();
    }

    let instrument = match store.get(preset_zone, Attribute::Instrument) {
        Some(value) => ElementId::Instrument {
            sf2: preset_zone.sf2(),
            instrument: value.word() as u32,
        },
        None => {
            warn!(element = %preset_zone, "Preset zone has no instrument.");
            return Vec::new();
        }
    };

    store
        .children(instrument)
        .into_iter()
        .flat_map(|zone| instrument_zone_voices(store, Some(preset_zone), zone, key, velocity))
        .collect()
}

fn instrument_zone_voices(
    store: &dyn SoundfontStore,
    preset_zone: Option<ElementId>,
    instrument_zone: ElementId,
    key: u8,
    velocity: u8,
) -> Vec<VoiceParams> {
    if !in_ranges(store, instrument_zone, key, velocity) {
        return Vec::new();
    }

    match store.get(instrument_zone, Attribute::Sample) {
        Some(value) => {
            let sample = ElementId::Sample {
                sf2: instrument_zone.sf2(),
                sample: value.word() as u32,
            };
            vec![VoiceParams::new(
                store,
                preset_zone,
                Some(instrument_zone),
                sample,
            )]
        }
        None => {
            warn!(element = %instrument_zone, "Instrument zone has no sample.");
            Vec::new()
        }
    }
}

fn in_ranges(store: &dyn SoundfontStore, zone: ElementId, key: u8, velocity: u8) -> bool {
    in_range(store, zone, Attribute::KeyRange, key)
        && in_range(store, zone, Attribute::VelocityRange, velocity)
}

/// Checks a value against the range of a zone, falling back to its global zone and then to
/// the full MIDI range.
fn in_range(store: &dyn SoundfontStore, zone: ElementId, attribute: Attribute, value: u8) -> bool {
    let (low, high) = store
        .get(zone, attribute)
        .or_else(|| zone.parent().and_then(|global| store.get(global, attribute)))
        .map_or((0, 127), |range| range.range());
    low <= value && value <= high
}
