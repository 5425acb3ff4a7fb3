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

//! The soundfont domain model as seen by the voice engine.
//!
//! This module provides:
//! - Element identities (samples, instruments, presets and their zones)
//! - Attribute types and the raw generator amount storage
//! - The generator table (defaults, ranges, units, preset-tier policy)
//! - Modulator records and their evaluation
//! - The attribute store seam and an in-memory implementation

mod attribute;
mod element;
mod generator;
mod modulator;
mod store;

pub use attribute::{Attribute, AttributeValue, SampleLink};
pub use element::{ElementId, ElementKind};
pub use generator::{
    seconds_to_timecents, timecents_to_seconds, Generator, GeneratorSpec, PresetPolicy, Unit,
};
pub use modulator::{
    ControllerSource, Curve, ModulationContext, Modulator, ModulatorSource, Transform,
};
pub use store::{MemoryStore, SoundfontStore};
