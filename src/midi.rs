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
use std::{fmt, sync::Arc};

use tracing::warn;

mod device;
mod error;
mod midir;
mod mock;

pub use device::{ControllerDisplay, KeyboardDisplay, MidiDevice, Notification, RawMessageSender};
pub use error::TransportError;

/// A MIDI input backend.
pub trait Transport: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Returns the names of the available input ports, by index.
    fn port_names(&self) -> Vec<String>;

    /// Opens the input port at the given index. Raw messages are sent to the given sender in
    /// arrival order. Sending never blocks the backend's callback.
    fn open_port(&self, index: usize, sender: RawMessageSender) -> Result<(), TransportError>;

    /// Closes the open port, if any, and drops its sender.
    fn close_port(&self);
}

/// Gets the transport with the given name. Names starting with "mock" give a mock transport.
/// A backend that fails to initialise gives no transport rather than an error.
pub fn get_transport(name: &str) -> Option<Arc<dyn Transport>> {
    if name.starts_with("mock") {
        return Some(Arc::new(mock::Transport::get(name)));
    }

    match midir::Transport::new(name) {
        Ok(transport) => Some(Arc::new(transport)),
        Err(e) => {
            warn!(err = %e, "MIDI backend unavailable, continuing without a device.");
            None
        }
    }
}
