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

use super::generator::Generator;

/// An attribute stored on a soundfont element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// A generator amount, on a zone or a global zone.
    Generator(Generator),
    /// The key range of a zone (low and high key).
    KeyRange,
    /// The velocity range of a zone (low and high velocity).
    VelocityRange,
    /// The instrument index referenced by a preset zone.
    Instrument,
    /// The sample index referenced by an instrument zone.
    Sample,
    /// The MIDI key the sample was recorded at.
    OriginalPitch,
    /// The sample pitch correction, in cents.
    PitchCorrection,
    /// The sample length, in frames.
    Length,
    /// The sample loop start, in frames.
    LoopStart,
    /// The sample loop end, in frames.
    LoopEnd,
    /// The sample link type (mono, left, right, ...).
    SampleLink,
    /// The preset number of a preset.
    PresetNumber,
}

impl From<Generator> for Attribute {
    fn from(generator: Generator) -> Self {
        Attribute::Generator(generator)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Generator(generator) => write!(f, "{:?}", generator),
            other => write!(f, "{:?}", other),
        }
    }
}

/// The raw value of an attribute. Soundfont amounts share a single 32-bit slot that is read
/// back as a signed short, an unsigned word, a double word, a signed byte or a byte range
/// depending on the attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttributeValue(u32);

impl AttributeValue {
    pub fn from_short(value: i16) -> Self {
        AttributeValue(value as u16 as u32)
    }

    pub fn from_word(value: u16) -> Self {
        AttributeValue(value as u32)
    }

    pub fn from_dword(value: u32) -> Self {
        AttributeValue(value)
    }

    pub fn from_char(value: i8) -> Self {
        AttributeValue(value as u8 as u32)
    }

    pub fn from_range(low: u8, high: u8) -> Self {
        AttributeValue(low as u32 | (high as u32) << 8)
    }

    pub fn short(self) -> i16 {
        self.0 as u16 as i16
    }

    pub fn word(self) -> u16 {
        self.0 as u16
    }

    pub fn dword(self) -> u32 {
        self.0
    }

    pub fn char(self) -> i8 {
        self.0 as u8 as i8
    }

    /// Returns the (low, high) pair of a range value.
    pub fn range(self) -> (u8, u8) {
        (self.0 as u8, (self.0 >> 8) as u8)
    }
}

/// The stereo role of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleLink {
    Mono,
    Right,
    Left,
    Linked,
    RomMono,
    RomRight,
    RomLeft,
    RomLinked,
}

impl SampleLink {
    /// Decodes a soundfont sample type word. Unknown values are treated as mono.
    pub fn from_word(value: u16) -> SampleLink {
        match value {
            2 => SampleLink::Right,
            4 => SampleLink::Left,
            8 => SampleLink::Linked,
            0x8001 => SampleLink::RomMono,
            0x8002 => SampleLink::RomRight,
            0x8004 => SampleLink::RomLeft,
            0x8008 => SampleLink::RomLinked,
            _ => SampleLink::Mono,
        }
    }

    /// Encodes the soundfont sample type word.
    pub fn to_word(self) -> u16 {
        match self {
            SampleLink::Mono => 1,
            SampleLink::Right => 2,
            SampleLink::Left => 4,
            SampleLink::Linked => 8,
            SampleLink::RomMono => 0x8001,
            SampleLink::RomRight => 0x8002,
            SampleLink::RomLeft => 0x8004,
            SampleLink::RomLinked => 0x8008,
        }
    }
}
