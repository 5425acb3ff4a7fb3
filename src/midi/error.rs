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
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MIDI backend initialisation error: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI port info error: {0}")]
    PortInfo(#[from] midir::PortInfoError),

    #[error("MIDI port {0} does not exist")]
    NoSuchPort(usize),

    #[error("MIDI connection error: {0}")]
    Connect(String),
}
