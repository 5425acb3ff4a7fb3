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

//! The generator table.
//!
//! Every generator the voice engine understands has a fixed default, a legal range, a unit
//! used when converting to a real value and a policy describing how a preset-level amount
//! combines with the instrument-level one.

use std::f64::consts::LN_2;

/// Reference frequency of absolute cent 0, in Hz.
const ABSOLUTE_CENT_ZERO_HZ: f64 = 8.176;

/// Converts timecents to seconds.
pub fn timecents_to_seconds(timecents: f64) -> f64 {
    (timecents / 1200.0).exp2()
}

/// Converts seconds to timecents.
pub fn seconds_to_timecents(seconds: f64) -> f64 {
    1200.0 * seconds.ln() / LN_2
}

/// The unit of a generator amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    /// Time, converted to seconds.
    Timecents,
    /// Frequency, converted to Hz.
    AbsoluteCents,
    /// Attenuation or resonance, converted to dB.
    Centibels,
    /// Proportion in 0.1% steps, converted to percent.
    TenthPercent,
    /// Used as-is (offsets, cents, semitones, keys, flags).
    Raw,
}

impl Unit {
    /// Converts a raw generator amount to its real value.
    pub fn to_real(self, amount: f64) -> f64 {
        match self {
            Unit::Timecents => timecents_to_seconds(amount),
            Unit::AbsoluteCents => ABSOLUTE_CENT_ZERO_HZ * (amount / 1200.0).exp2(),
            Unit::Centibels | Unit::TenthPercent => amount / 10.0,
            Unit::Raw => amount,
        }
    }
}

/// How a preset-level amount combines with the instrument-level one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresetPolicy {
    /// The preset amount is added to the instrument amount.
    Additive,
    /// The generator is only meaningful at instrument level; preset amounts are ignored.
    InstrumentOnly,
}

/// The static description of a generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorSpec {
    /// Value used when no tier sets the generator.
    pub default: i32,
    /// Lowest legal resolved amount.
    pub min: i32,
    /// Highest legal resolved amount.
    pub max: i32,
    pub unit: Unit,
    pub preset: PresetPolicy,
    /// Whether the stored amount is a signed short (otherwise an unsigned word).
    pub signed: bool,
}

/// A generator the voice engine resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generator {
    // Sample offsets
    StartAddrsOffset,
    StartAddrsCoarseOffset,
    EndAddrsOffset,
    EndAddrsCoarseOffset,
    StartloopAddrsOffset,
    StartloopAddrsCoarseOffset,
    EndloopAddrsOffset,
    EndloopAddrsCoarseOffset,

    // Volume envelope
    DelayVolEnv,
    AttackVolEnv,
    HoldVolEnv,
    DecayVolEnv,
    SustainVolEnv,
    ReleaseVolEnv,
    KeynumToVolEnvHold,
    KeynumToVolEnvDecay,

    // Modulation envelope
    DelayModEnv,
    AttackModEnv,
    HoldModEnv,
    DecayModEnv,
    SustainModEnv,
    ReleaseModEnv,
    KeynumToModEnvHold,
    KeynumToModEnvDecay,
    ModEnvToFilterFc,
    ModEnvToPitch,

    // Modulation LFO
    DelayModLfo,
    FreqModLfo,
    ModLfoToPitch,
    ModLfoToFilterFc,
    ModLfoToVolume,

    // Vibrato LFO
    DelayVibLfo,
    FreqVibLfo,
    VibLfoToPitch,

    // Filter and attenuation
    InitialFilterFc,
    InitialFilterQ,
    InitialAttenuation,

    // Effects and pan
    ChorusEffectsSend,
    ReverbEffectsSend,
    Pan,

    // Tuning
    CoarseTune,
    FineTune,
    ScaleTuning,

    // Other
    OverridingRootKey,
    Keynum,
    Velocity,
    SampleModes,
    ExclusiveClass,
}

impl Generator {
    /// Every generator, in table order.
    pub const ALL: [Generator; 48] = [
        Generator::StartAddrsOffset,
        Generator::StartAddrsCoarseOffset,
        Generator::EndAddrsOffset,
        Generator::EndAddrsCoarseOffset,
        Generator::StartloopAddrsOffset,
        Generator::StartloopAddrsCoarseOffset,
        Generator::EndloopAddrsOffset,
        Generator::EndloopAddrsCoarseOffset,
        Generator::DelayVolEnv,
        Generator::AttackVolEnv,
        Generator::HoldVolEnv,
        Generator::DecayVolEnv,
        Generator::SustainVolEnv,
        Generator::ReleaseVolEnv,
        Generator::KeynumToVolEnvHold,
        Generator::KeynumToVolEnvDecay,
        Generator::DelayModEnv,
        Generator::AttackModEnv,
        Generator::HoldModEnv,
        Generator::DecayModEnv,
        Generator::SustainModEnv,
        Generator::ReleaseModEnv,
        Generator::KeynumToModEnvHold,
        Generator::KeynumToModEnvDecay,
        Generator::ModEnvToFilterFc,
        Generator::ModEnvToPitch,
        Generator::DelayModLfo,
        Generator::FreqModLfo,
        Generator::ModLfoToPitch,
        Generator::ModLfoToFilterFc,
        Generator::ModLfoToVolume,
        Generator::DelayVibLfo,
        Generator::FreqVibLfo,
        Generator::VibLfoToPitch,
        Generator::InitialFilterFc,
        Generator::InitialFilterQ,
        Generator::InitialAttenuation,
        Generator::ChorusEffectsSend,
        Generator::ReverbEffectsSend,
        Generator::Pan,
        Generator::CoarseTune,
        Generator::FineTune,
        Generator::ScaleTuning,
        Generator::OverridingRootKey,
        Generator::Keynum,
        Generator::Velocity,
        Generator::SampleModes,
        Generator::ExclusiveClass,
    ];

    /// Returns the table entry for this generator.
    pub fn spec(self) -> GeneratorSpec {
        use PresetPolicy::{Additive, InstrumentOnly};
        use Unit::{AbsoluteCents, Centibels, Raw, TenthPercent, Timecents};

        let (default, min, max, unit, preset) = match self {
            Generator::StartAddrsOffset
            | Generator::StartAddrsCoarseOffset
            | Generator::EndAddrsOffset
            | Generator::EndAddrsCoarseOffset
            | Generator::StartloopAddrsOffset
            | Generator::StartloopAddrsCoarseOffset
            | Generator::EndloopAddrsOffset
            | Generator::EndloopAddrsCoarseOffset => {
                (0, i16::MIN as i32, i16::MAX as i32, Raw, InstrumentOnly)
            }

            Generator::DelayVolEnv
            | Generator::HoldVolEnv
            | Generator::DelayModEnv
            | Generator::HoldModEnv
            | Generator::DelayModLfo
            | Generator::DelayVibLfo => (-12000, -12000, 5000, Timecents, Additive),
            Generator::AttackVolEnv
            | Generator::DecayVolEnv
            | Generator::ReleaseVolEnv
            | Generator::AttackModEnv
            | Generator::DecayModEnv
            | Generator::ReleaseModEnv => (-12000, -12000, 8000, Timecents, Additive),
            Generator::SustainVolEnv => (0, 0, 1440, Centibels, Additive),
            Generator::SustainModEnv => (0, 0, 1000, TenthPercent, Additive),
            Generator::KeynumToVolEnvHold
            | Generator::KeynumToVolEnvDecay
            | Generator::KeynumToModEnvHold
            | Generator::KeynumToModEnvDecay => (0, -1200, 1200, Raw, Additive),
            Generator::ModEnvToFilterFc
            | Generator::ModEnvToPitch
            | Generator::ModLfoToPitch
            | Generator::ModLfoToFilterFc
            | Generator::VibLfoToPitch => (0, -12000, 12000, Raw, Additive),

            Generator::FreqModLfo | Generator::FreqVibLfo => {
                (0, -16000, 4500, AbsoluteCents, Additive)
            }
            Generator::ModLfoToVolume => (0, -960, 960, Centibels, Additive),

            Generator::InitialFilterFc => (13500, 1500, 13500, AbsoluteCents, Additive),
            Generator::InitialFilterQ => (0, 0, 960, Centibels, Additive),
            Generator::InitialAttenuation => (0, 0, 1440, Centibels, Additive),

            Generator::ChorusEffectsSend | Generator::ReverbEffectsSend => {
                (0, 0, 1000, TenthPercent, Additive)
            }
            Generator::Pan => (0, -500, 500, TenthPercent, Additive),

            Generator::CoarseTune => (0, -120, 120, Raw, Additive),
            Generator::FineTune => (0, -99, 99, Raw, Additive),
            Generator::ScaleTuning => (100, 0, 1200, Raw, Additive),

            Generator::OverridingRootKey | Generator::Keynum | Generator::Velocity => {
                (-1, -1, 127, Raw, InstrumentOnly)
            }
            Generator::SampleModes => (0, 0, 3, Raw, InstrumentOnly),
            Generator::ExclusiveClass => (0, 0, u16::MAX as i32, Raw, InstrumentOnly),
        };

        GeneratorSpec {
            default,
            min,
            max,
            unit,
            preset,
            signed: !matches!(self, Generator::SampleModes | Generator::ExclusiveClass),
        }
    }
}
