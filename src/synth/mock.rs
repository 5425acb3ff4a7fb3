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
use parking_lot::Mutex;

use crate::soundfont::ElementId;

/// A call received by the mock synth.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Play {
        id: Option<ElementId>,
        key: i32,
        velocity: i32,
    },
    Stop,
}

/// A synth that records every call.
#[derive(Default)]
pub struct Synth {
    calls: Mutex<Vec<Call>>,
}

impl Synth {
    pub fn new() -> Synth {
        Synth::default()
    }

    /// Returns the calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl super::Synth for Synth {
    fn play(&self, id: Option<ElementId>, key: i32, velocity: i32) {
        self.calls.lock().push(Call::Play { id, key, velocity });
    }

    fn stop(&self) {
        self.calls.lock().push(Call::Stop);
    }
}
