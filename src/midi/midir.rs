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
use std::{fmt, mem};

use midir::{Ignore, MidiInput, MidiInputConnection};
use parking_lot::Mutex;
use tracing::{debug, info, span, warn, Level};

use super::{RawMessageSender, TransportError};

/// The midir input backend.
pub struct Transport {
    client_name: String,
    connection: Mutex<Option<MidiInputConnection<()>>>,
}

impl Transport {
    /// Creates the transport, checking that the backend can be initialised.
    pub fn new(client_name: &str) -> Result<Transport, TransportError> {
        MidiInput::new(client_name)?;
        Ok(Transport {
            client_name: client_name.to_string(),
            connection: Mutex::new(None),
        })
    }

    fn input(&self) -> Result<MidiInput, TransportError> {
        let mut input = MidiInput::new(&self.client_name)?;
        input.ignore(Ignore::None);
        Ok(input)
    }
}

impl super::Transport for Transport {
    fn port_names(&self) -> Vec<String> {
        let input = match self.input() {
            Ok(input) => input,
            Err(e) => {
                warn!(err = %e, "Unable to list MIDI ports.");
                return Vec::new();
            }
        };

        input
            .ports()
            .iter()
            .filter_map(|port| match input.port_name(port) {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(err = %e, "Unable to get MIDI port name.");
                    None
                }
            })
            .collect()
    }

    fn open_port(&self, index: usize, sender: RawMessageSender) -> Result<(), TransportError> {
        let span = span!(Level::INFO, "open port (midir)");
        let _enter = span.enter();

        self.close_port();

        let input = self.input()?;
        let ports = input.ports();
        let port = ports.get(index).ok_or(TransportError::NoSuchPort(index))?;
        let port_name = input.port_name(port)?;

        let connection = input
            .connect(
                port,
                &format!("{} input", self.client_name),
                move |_, raw_message, _| {
                    sender.send(raw_message);
                },
                (),
            )
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!(port = port_name, index, "Opened MIDI input port.");
        *self.connection.lock() = Some(connection);
        Ok(())
    }

    fn close_port(&self) {
        // Dropping the connection drops the callback and its sender.
        let connection = self.connection.lock().take();
        if let Some(connection) = connection {
            mem::drop(connection.close());
            debug!("Closed MIDI input port.");
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (midir)", self.client_name)
    }
}
