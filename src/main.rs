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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{crate_version, Parser, Subcommand};
use sfvoice::config::{Section, Settings};
use sfvoice::midi::{self, MidiDevice, Notification};
use sfvoice::synth::LoggingSynth;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CLIENT_NAME: &str = "sfvoice";

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Soundfont voice engine tools."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI input ports.
    MidiPorts {},
    /// Prints the decoded events of a MIDI input port until interrupted.
    Monitor {
        /// The settings file to read (YAML, TOML or JSON).
        #[arg[short, long]]
        settings: Option<PathBuf>,
        /// The index of the port to open. Overrides midi.index_port.
        #[arg[short, long]]
        port: Option<i64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MidiPorts {} => {
            let port_names = midi::get_transport(CLIENT_NAME)
                .map(|transport| transport.port_names())
                .unwrap_or_default();

            if port_names.is_empty() {
                println!("No ports found.");
                return Ok(());
            }

            println!("Ports:");
            for (index, name) in port_names.iter().enumerate() {
                println!("- {}: {}", index, name);
            }
        }
        Commands::Monitor { settings, port } => {
            let settings = Arc::new(match settings {
                Some(path) => Settings::load(&path)?,
                None => Settings::new(),
            });
            if let Some(port) = port {
                settings.set(Section::Midi, "index_port", port);
            }

            let device = MidiDevice::new(
                settings.clone(),
                Arc::new(LoggingSynth),
                midi::get_transport(CLIENT_NAME),
            );
            let notifications = device.subscribe();
            let printer = thread::spawn(move || {
                for notification in notifications.iter() {
                    print_notification(&notification);
                }
            });

            info!("Monitoring MIDI input, press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;

            // Shutting down applies what is still queued, dropping the device closes the
            // notification channel.
            device.shutdown();
            drop(device);
            if printer.join().is_err() {
                return Err("Error while joining the printer thread.".into());
            }

            let gain = settings.get_f64(Section::SoundEngine, "gain", 0.0);
            info!(gain, "Monitoring stopped.");
        }
    }

    Ok(())
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::KeyPlayed { key, velocity: 0 } => println!("key {} released", key),
        Notification::KeyPlayed { key, velocity } => {
            println!("key {} played (velocity {})", key, velocity)
        }
        Notification::ControllerChanged { controller, value } => {
            println!("controller {} = {}", controller, value)
        }
        Notification::PolyPressureChanged { key, pressure } => {
            println!("key {} pressure = {}", key, pressure)
        }
        Notification::MonoPressureChanged(value) => println!("channel pressure = {}", value),
        Notification::BendChanged(value) => println!("bend = {}", value),
        Notification::BendSensitivityChanged(semitones) => {
            println!("bend sensitivity = {:.2} semitones", semitones)
        }
    }
}
