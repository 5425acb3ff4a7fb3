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

use parking_lot::Mutex;
use tracing::info;

use super::{RawMessageSender, TransportError};

const PORT_COUNT: usize = 2;

/// A mock transport with two ports. Messages are injected by tests.
pub struct Transport {
    name: String,
    sender: Mutex<Option<RawMessageSender>>,
    opened: Mutex<Option<usize>>,
}

impl Transport {
    /// Gets the given mock transport.
    pub fn get(name: &str) -> Transport {
        Transport {
            name: name.to_string(),
            sender: Mutex::new(None),
            opened: Mutex::new(None),
        }
    }

    #[cfg(test)]
    /// Sends a raw message through the open port. Returns false if no port is open or the
    /// message was dropped.
    pub fn mock_event(&self, raw_message: &[u8]) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(raw_message),
            None => false,
        }
    }

    #[cfg(test)]
    /// Returns the index of the open port.
    pub fn opened_port(&self) -> Option<usize> {
        *self.opened.lock()
    }
}

impl super::Transport for Transport {
    fn port_names(&self) -> Vec<String> {
        (0..PORT_COUNT)
            .map(|index| format!("{} port {}", self.name, index))
            .collect()
    }

    fn open_port(&self, index: usize, sender: RawMessageSender) -> Result<(), TransportError> {
        if index >= PORT_COUNT {
            return Err(TransportError::NoSuchPort(index));
        }

        info!(transport = self.name, index, "Opened mock port.");
        *self.sender.lock() = Some(sender);
        *self.opened.lock() = Some(index);
        Ok(())
    }

    fn close_port(&self) {
        self.sender.lock().take();
        self.opened.lock().take();
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (mock)", self.name)
    }
}
