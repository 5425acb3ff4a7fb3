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

//! The synthesis engine as seen by the MIDI controller.

use tracing::info;

use crate::soundfont::ElementId;

#[cfg(test)]
pub mod mock;

/// Receives the directives the MIDI controller cannot express as key events.
pub trait Synth: Send + Sync {
    /// Plays an element at the given key and velocity. `play(None, -1, 0)` is the all-stop
    /// convention used when a key-off arrives for key -1.
    fn play(&self, id: Option<ElementId>, key: i32, velocity: i32);

    /// Stops every voice.
    fn stop(&self);
}

/// A synth that only logs what it is asked to do. Used by the CLI monitor.
#[derive(Default)]
pub struct LoggingSynth;

impl Synth for LoggingSynth {
    fn play(&self, id: Option<ElementId>, key: i32, velocity: i32) {
        match id {
            Some(id) => info!(element = %id, key, velocity, "Play."),
            None => info!(key, velocity, "Play (no element)."),
        }
    }

    fn stop(&self) {
        info!("Stop all voices.");
    }
}
