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

//! Voice parameter resolution.
//!
//! This module provides:
//! - Per-generator parameters combining instrument and preset amounts
//! - The resolver merging sample, instrument zone and preset zone attributes
//! - Voice selection for a key press on a sample, instrument or preset

mod modulated;
mod params;
mod select;

pub use modulated::ModulatedParameter;
pub use params::{Position, VoiceParams};
pub use select::select_voices;
