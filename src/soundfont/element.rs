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
use std::fmt;

/// The kind of an element, without its indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Sample,
    Instrument,
    InstrumentZone,
    Preset,
    PresetZone,
}

/// Identifies an element of a loaded soundfont. Instruments and presets double as their
/// global zone: attributes stored on them apply to every zone that does not set its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Sample {
        sf2: u32,
        sample: u32,
    },
    Instrument {
        sf2: u32,
        instrument: u32,
    },
    InstrumentZone {
        sf2: u32,
        instrument: u32,
        zone: u32,
    },
    Preset {
        sf2: u32,
        preset: u32,
    },
    PresetZone {
        sf2: u32,
        preset: u32,
        zone: u32,
    },
}

impl ElementId {
    /// Returns the kind of this element.
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementId::Sample { .. } => ElementKind::Sample,
            ElementId::Instrument { .. } => ElementKind::Instrument,
            ElementId::InstrumentZone { .. } => ElementKind::InstrumentZone,
            ElementId::Preset { .. } => ElementKind::Preset,
            ElementId::PresetZone { .. } => ElementKind::PresetZone,
        }
    }

    /// Returns the soundfont index of this element.
    pub fn sf2(&self) -> u32 {
        match *self {
            ElementId::Sample { sf2, .. }
            | ElementId::Instrument { sf2, .. }
            | ElementId::InstrumentZone { sf2, .. }
            | ElementId::Preset { sf2, .. }
            | ElementId::PresetZone { sf2, .. } => sf2,
        }
    }

    /// Returns the element holding the global zone of a zone, if this is a zone.
    pub fn parent(&self) -> Option<ElementId> {
        match *self {
            ElementId::InstrumentZone {
                sf2, instrument, ..
            } => Some(ElementId::Instrument { sf2, instrument }),
            ElementId::PresetZone { sf2, preset, .. } => Some(ElementId::Preset { sf2, preset }),
            _ => None,
        }
    }

    /// Returns true if the given element is a zone of this instrument or preset.
    pub fn owns(&self, other: &ElementId) -> bool {
        other.parent().as_ref() == Some(self)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Sample { sf2, sample } => write!(f, "sf2 {sf2} sample {sample}"),
            ElementId::Instrument { sf2, instrument } => {
                write!(f, "sf2 {sf2} instrument {instrument}")
            }
            ElementId::InstrumentZone {
                sf2,
                instrument,
                zone,
            } => write!(f, "sf2 {sf2} instrument {instrument} zone {zone}"),
            ElementId::Preset { sf2, preset } => write!(f, "sf2 {sf2} preset {preset}"),
            ElementId::PresetZone { sf2, preset, zone } => {
                write!(f, "sf2 {sf2} preset {preset} zone {zone}")
            }
        }
    }
}
