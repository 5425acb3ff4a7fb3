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
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, OnceLock, Weak},
    thread::{self, JoinHandle, ThreadId},
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use midly::{live::LiveEvent, MidiMessage};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, span, warn, Level};

use super::Transport;
use crate::{
    config::{Section, Settings},
    soundfont::ModulationContext,
    synth::Synth,
};

/// Capacity of the queue feeding the processing thread.
const MESSAGE_QUEUE_SIZE: usize = 1024;

const SUSTAIN_CONTROLLER: i32 = 64;
const VOLUME_CONTROLLER: i32 = 7;
const RPN_MSB: i32 = 101;
const RPN_LSB: i32 = 100;
const DATA_ENTRY_MSB: i32 = 6;
const DATA_ENTRY_LSB: i32 = 38;
const RPN_HISTORY_SIZE: usize = 4;

/// An event published to subscribers after the state it describes has been applied.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A key was played. A velocity of 0 is a release.
    KeyPlayed { key: i32, velocity: i32 },
    ControllerChanged { controller: i32, value: i32 },
    PolyPressureChanged { key: i32, pressure: i32 },
    MonoPressureChanged(i32),
    BendChanged(i32),
    /// Bend sensitivity in semitones, cents as the fractional part.
    BendSensitivityChanged(f64),
}

/// The on-screen keyboard. Its own key presses come back through
/// [MidiDevice::process_key_on] and [MidiDevice::process_key_off] with `sync` set to false.
pub trait KeyboardDisplay: Send + Sync {
    fn note_on(&self, key: i32, velocity: i32);
    fn note_off(&self, key: i32);
    /// Removes every highlight and customisation.
    fn clear(&self);
}

/// The on-screen controller area. Its own changes come back through the `process_*` methods
/// with `sync` set to false.
pub trait ControllerDisplay: Send + Sync {
    fn update_controller(&self, controller: i32, value: i32);
    fn update_mono_pressure(&self, value: i32);
    fn update_bend(&self, value: i32);
    fn update_bend_sensitivity(&self, semitones: f64);
}

/// Work for the processing thread. Transport messages and display-originated changes share
/// one queue so that only the processing thread mutates key state.
enum Command {
    Raw(Vec<u8>),
    KeyOn { key: i32, velocity: i32, sync: bool },
    KeyOff { key: i32, sync: bool },
    Controller { controller: i32, value: i32, sync: bool },
    PolyPressure { key: i32, pressure: i32 },
    MonoPressure { value: i32, sync: bool },
    Bend { value: i32, sync: bool },
    BendSensitivity { semitones: f64, sync: bool },
    StopAll,
    Flush(Sender<()>),
}

/// The handle a transport uses to queue raw messages. Sending never blocks: when the queue is
/// full the message is dropped.
#[derive(Clone)]
pub struct RawMessageSender {
    sender: Sender<Command>,
}

impl RawMessageSender {
    /// Queues a raw message. Returns false if it was dropped.
    pub fn send(&self, raw_message: &[u8]) -> bool {
        match self.sender.try_send(Command::Raw(raw_message.to_vec())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(message = ?raw_message, "MIDI queue is full, dropping message.");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("MIDI device is gone, dropping message.");
                false
            }
        }
    }
}

#[derive(Default)]
struct Values {
    controllers: HashMap<i32, i32>,
    bend: Option<i32>,
    bend_sensitivity: Option<f64>,
    mono_pressure: Option<i32>,
}

#[derive(Default)]
struct KeyState {
    sustain_on: bool,
    held_for_sustain: VecDeque<i32>,
    rpn_history: VecDeque<(i32, i32)>,
}

impl KeyState {
    /// Records a controller in the RPN history and returns the bend sensitivity if the history
    /// now holds a complete pitch bend sensitivity sequence.
    fn push_rpn(&mut self, controller: i32, value: i32) -> Option<f64> {
        self.rpn_history.push_back((controller, value));
        while self.rpn_history.len() > RPN_HISTORY_SIZE {
            self.rpn_history.pop_front();
        }

        if controller != DATA_ENTRY_LSB || self.rpn_history.len() != RPN_HISTORY_SIZE {
            return None;
        }
        match (
            self.rpn_history[0],
            self.rpn_history[1],
            self.rpn_history[2],
            self.rpn_history[3],
        ) {
            ((RPN_MSB, 0), (RPN_LSB, 0), (DATA_ENTRY_MSB, semitones), (DATA_ENTRY_LSB, cents)) => {
                Some(semitones as f64 + 0.01 * cents as f64)
            }
            _ => None,
        }
    }
}

/// The MIDI controller state machine.
///
/// Transport messages and the `process_*` calls are queued and applied one at a time, in
/// order, on a dedicated processing thread. Values are stored before any notification is
/// published, and no lock is held while notifying. Calls made from the processing thread
/// itself, such as from a display callback, are applied immediately.
pub struct MidiDevice {
    settings: Arc<Settings>,
    synth: Arc<dyn Synth>,
    transport: Option<Arc<dyn Transport>>,
    values: Mutex<Values>,
    keys: Mutex<KeyState>,
    keyboard: RwLock<Option<Arc<dyn KeyboardDisplay>>>,
    controller_area: RwLock<Option<Arc<dyn ControllerDisplay>>>,
    subscribers: Mutex<Vec<Sender<Notification>>>,
    sender: Mutex<Option<Sender<Command>>>,
    processing_thread: Mutex<Option<JoinHandle<()>>>,
    processing_thread_id: OnceLock<ThreadId>,
}

impl MidiDevice {
    /// Creates the device, starts its processing thread and opens the port stored in the
    /// `midi.index_port` setting.
    pub fn new(
        settings: Arc<Settings>,
        synth: Arc<dyn Synth>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Arc<MidiDevice> {
        let (sender, receiver) = crossbeam_channel::bounded(MESSAGE_QUEUE_SIZE);
        let device = Arc::new(MidiDevice {
            settings,
            synth,
            transport,
            values: Mutex::new(Values::default()),
            keys: Mutex::new(KeyState::default()),
            keyboard: RwLock::new(None),
            controller_area: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            sender: Mutex::new(Some(sender)),
            processing_thread: Mutex::new(None),
            processing_thread_id: OnceLock::new(),
        });

        let weak = Arc::downgrade(&device);
        let handle = thread::spawn(move || Self::process_commands(weak, receiver));
        // Set before anything can be queued.
        let _ = device.processing_thread_id.set(handle.thread().id());
        *device.processing_thread.lock() = Some(handle);

        let index = device.settings.get_i64(Section::Midi, "index_port", -1);
        device.open_port(index.try_into().unwrap_or(-1));
        device
    }

    fn process_commands(device: Weak<MidiDevice>, receiver: Receiver<Command>) {
        let span = span!(Level::INFO, "midi processing");
        let _enter = span.enter();

        info!("Processing MIDI messages.");
        for command in receiver.iter() {
            // Without a device left there is nothing to apply the rest of the queue to.
            let Some(device) = device.upgrade() else {
                break;
            };
            device.apply(command);
        }
        info!("MIDI processing stopped.");
    }

    fn apply(&self, command: Command) {
        match command {
            Command::Raw(raw_message) => self.apply_raw_message(&raw_message),
            Command::KeyOn {
                key,
                velocity,
                sync,
            } => self.apply_key_on(key, velocity, sync),
            Command::KeyOff { key, sync } => self.apply_key_off(key, sync),
            Command::Controller {
                controller,
                value,
                sync,
            } => self.apply_controller_changed(controller, value, sync),
            Command::PolyPressure { key, pressure } => {
                self.notify(Notification::PolyPressureChanged { key, pressure })
            }
            Command::MonoPressure { value, sync } => self.apply_mono_pressure_changed(value, sync),
            Command::Bend { value, sync } => self.apply_bend_changed(value, sync),
            Command::BendSensitivity { semitones, sync } => {
                self.apply_bend_sensitivity_changed(semitones, sync)
            }
            Command::StopAll => self.apply_stop_all(),
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    fn on_processing_thread(&self) -> bool {
        self.processing_thread_id.get() == Some(&thread::current().id())
    }

    /// Applies a command in order with everything queued before it.
    fn post(&self, command: Command) {
        if self.on_processing_thread() {
            self.apply(command);
            return;
        }

        let Some(sender) = self.sender.lock().clone() else {
            debug!("MIDI device is shut down, dropping command.");
            return;
        };
        if sender.send(command).is_err() {
            debug!("MIDI processing thread is gone, dropping command.");
        }
    }

    /// Blocks until every command queued so far has been applied.
    pub fn wait_idle(&self) {
        if self.on_processing_thread() {
            return;
        }
        let (done, wait) = crossbeam_channel::bounded(1);
        self.post(Command::Flush(done));
        // An error means the processing thread stopped; nothing is left to wait for.
        let _ = wait.recv();
    }

    /// Queues a raw MIDI message, as if received from the transport.
    pub fn process_raw_message(&self, raw_message: &[u8]) {
        self.post(Command::Raw(raw_message.to_vec()));
    }

    fn apply_raw_message(&self, raw_message: &[u8]) {
        let event = match LiveEvent::parse(raw_message) {
            Ok(event) => event,
            Err(e) => {
                debug!(err = %e, message = ?raw_message, "Unparseable MIDI message.");
                return;
            }
        };
        let LiveEvent::Midi { message, .. } = event else {
            debug!(event = ?event, "Ignoring non channel MIDI message.");
            return;
        };

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                self.apply_key_on(key.as_int() as i32, vel.as_int() as i32, true)
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                self.apply_key_off(key.as_int() as i32, true)
            }
            MidiMessage::Aftertouch { key, vel } => {
                self.notify(Notification::PolyPressureChanged {
                    key: key.as_int() as i32,
                    pressure: vel.as_int() as i32,
                })
            }
            MidiMessage::Controller { controller, value } => self.apply_controller_changed(
                controller.as_int() as i32,
                value.as_int() as i32,
                true,
            ),
            MidiMessage::ProgramChange { program } => {
                debug!(program = program.as_int(), "Program change.");
            }
            MidiMessage::ChannelAftertouch { vel } => {
                self.apply_mono_pressure_changed(vel.as_int() as i32, true)
            }
            MidiMessage::PitchBend { bend } => {
                self.apply_bend_changed(bend.0.as_int() as i32, true)
            }
        }
    }

    /// Returns a receiver for every notification published from now on.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(sender);
        receiver
    }

    pub fn set_keyboard(&self, keyboard: Arc<dyn KeyboardDisplay>) {
        *self.keyboard.write() = Some(keyboard);
    }

    pub fn set_controller_area(&self, controller_area: Arc<dyn ControllerDisplay>) {
        *self.controller_area.write() = Some(controller_area);
    }

    /// Returns the names of the transport's input ports.
    pub fn port_names(&self) -> Vec<String> {
        self.transport
            .as_ref()
            .map_or_else(Vec::new, |transport| transport.port_names())
    }

    /// Closes the current port and opens the given one. -1 or an index out of range only closes.
    pub fn open_port(&self, index: i32) {
        let Some(transport) = self.transport.as_ref() else {
            return;
        };
        transport.close_port();

        let port_count = transport.port_names().len();
        let index = match usize::try_from(index) {
            Ok(index) if index < port_count => index,
            _ => {
                debug!(index, port_count, "No MIDI port to open.");
                return;
            }
        };

        let Some(sender) = self.sender.lock().clone() else {
            debug!("MIDI device is shut down, not opening a port.");
            return;
        };
        if let Err(e) = transport.open_port(index, RawMessageSender { sender }) {
            warn!(err = %e, index, "Unable to open MIDI port.");
        }
    }

    pub fn process_key_on(&self, key: i32, velocity: i32, sync: bool) {
        self.post(Command::KeyOn {
            key,
            velocity,
            sync,
        });
    }

    /// Releases a key. Key -1 stops the sample being previewed.
    pub fn process_key_off(&self, key: i32, sync: bool) {
        self.post(Command::KeyOff { key, sync });
    }

    pub fn process_controller_changed(&self, controller: i32, value: i32, sync: bool) {
        self.post(Command::Controller {
            controller,
            value,
            sync,
        });
    }

    /// Forwards a key pressure change. It is not stored and never shown.
    pub fn process_poly_pressure_changed(&self, key: i32, pressure: i32, _sync: bool) {
        self.post(Command::PolyPressure { key, pressure });
    }

    pub fn process_mono_pressure_changed(&self, value: i32, sync: bool) {
        self.post(Command::MonoPressure { value, sync });
    }

    /// Sets the bend from its 14 bit value, 8192 being centered.
    pub fn process_bend_changed(&self, value: i32, sync: bool) {
        self.post(Command::Bend { value, sync });
    }

    pub fn process_bend_sensitivity_changed(&self, semitones: f64, sync: bool) {
        self.post(Command::BendSensitivity { semitones, sync });
    }

    /// Releases every sustained key, clears the keyboard and stops all voices. Returns once
    /// this is done.
    pub fn stop_all(&self) {
        self.post(Command::StopAll);
        self.wait_idle();
    }

    fn apply_key_on(&self, key: i32, velocity: i32, sync: bool) {
        if velocity <= 0 {
            self.apply_key_off(key, sync);
            return;
        }

        if sync {
            if let Some(keyboard) = self.keyboard() {
                keyboard.note_on(key, velocity);
            }
        }

        let retrigger = {
            let mut keys = self.keys.lock();
            match keys.held_for_sustain.iter().position(|held| *held == key) {
                Some(position) => {
                    keys.held_for_sustain.remove(position);
                    true
                }
                None => false,
            }
        };
        if retrigger {
            self.notify(Notification::KeyPlayed { key, velocity: 0 });
        }
        self.notify(Notification::KeyPlayed { key, velocity });
    }

    fn apply_key_off(&self, key: i32, sync: bool) {
        if sync {
            if let Some(keyboard) = self.keyboard() {
                keyboard.note_off(key);
            }
        }

        if key == -1 {
            self.synth.play(None, -1, 0);
            return;
        }

        let held = {
            let mut keys = self.keys.lock();
            if keys.sustain_on && !keys.held_for_sustain.contains(&key) {
                keys.held_for_sustain.push_back(key);
            }
            keys.sustain_on
        };
        if !held {
            self.notify(Notification::KeyPlayed { key, velocity: 0 });
        }
    }

    fn apply_controller_changed(&self, controller: i32, value: i32, sync: bool) {
        self.values.lock().controllers.insert(controller, value);

        let mut released = Vec::new();
        let mut bend_sensitivity = None;
        match controller {
            SUSTAIN_CONTROLLER => {
                let mut keys = self.keys.lock();
                keys.sustain_on = value >= 64;
                if !keys.sustain_on {
                    released = keys.held_for_sustain.drain(..).collect();
                }
            }
            VOLUME_CONTROLLER => {
                let gain = value as f64 / 127.0 * 101.0 - 50.5;
                self.settings.set(Section::SoundEngine, "gain", gain);
            }
            RPN_MSB | RPN_LSB | DATA_ENTRY_MSB | DATA_ENTRY_LSB => {
                bend_sensitivity = self.keys.lock().push_rpn(controller, value);
            }
            _ => {}
        }

        self.notify(Notification::ControllerChanged { controller, value });
        for key in released {
            self.apply_key_off(key, true);
        }
        if let Some(semitones) = bend_sensitivity {
            self.apply_bend_sensitivity_changed(semitones, sync);
        }

        if sync {
            if let Some(controller_area) = self.controller_area() {
                controller_area.update_controller(controller, value);
            }
        }
    }

    fn apply_mono_pressure_changed(&self, value: i32, sync: bool) {
        self.values.lock().mono_pressure = Some(value);
        self.notify(Notification::MonoPressureChanged(value));
        if sync {
            if let Some(controller_area) = self.controller_area() {
                controller_area.update_mono_pressure(value);
            }
        }
    }

    fn apply_bend_changed(&self, value: i32, sync: bool) {
        self.values.lock().bend = Some(value);
        self.notify(Notification::BendChanged(value));
        if sync {
            if let Some(controller_area) = self.controller_area() {
                controller_area.update_bend(value);
            }
        }
    }

    fn apply_bend_sensitivity_changed(&self, semitones: f64, sync: bool) {
        self.values.lock().bend_sensitivity = Some(semitones);
        self.notify(Notification::BendSensitivityChanged(semitones));
        if sync {
            if let Some(controller_area) = self.controller_area() {
                controller_area.update_bend_sensitivity(semitones);
            }
        }
    }

    fn apply_stop_all(&self) {
        let released: Vec<i32> = self.keys.lock().held_for_sustain.drain(..).collect();
        let keyboard = self.keyboard();
        for key in released {
            if let Some(keyboard) = keyboard.as_ref() {
                keyboard.note_off(key);
            }
            self.notify(Notification::KeyPlayed { key, velocity: 0 });
        }
        if let Some(keyboard) = keyboard {
            keyboard.clear();
        }
        self.synth.stop();
    }

    /// Returns the last value of a controller, if it has been received.
    pub fn controller_value(&self, controller: i32) -> Option<i32> {
        self.values.lock().controllers.get(&controller).copied()
    }

    pub fn bend_value(&self) -> Option<i32> {
        self.values.lock().bend
    }

    pub fn bend_sensitivity_value(&self) -> Option<f64> {
        self.values.lock().bend_sensitivity
    }

    pub fn mono_pressure_value(&self) -> Option<i32> {
        self.values.lock().mono_pressure
    }

    pub fn is_sustain_on(&self) -> bool {
        self.keys.lock().sustain_on
    }

    /// Builds the modulation context of a new voice from the current controller state.
    pub fn modulation_context(&self, key: u8, velocity: u8) -> ModulationContext {
        let mut context = ModulationContext::new(key, velocity);
        let values = self.values.lock();
        for (controller, value) in values.controllers.iter() {
            if let (Ok(controller), Ok(value)) = (u8::try_from(*controller), u8::try_from(*value))
            {
                if controller < 128 {
                    context.set_controller(controller, value);
                }
            }
        }
        if let Some(pressure) = values.mono_pressure {
            context.channel_pressure = pressure.clamp(0, 127) as u8;
        }
        if let Some(bend) = values.bend {
            context.pitch_wheel = bend.clamp(0, 16383) as u16;
        }
        if let Some(sensitivity) = values.bend_sensitivity {
            context.bend_sensitivity = sensitivity;
        }
        context
    }

    /// Closes the port, applies every command already queued and stops the processing thread.
    /// Dropping the device without calling this discards whatever is still queued.
    pub fn shutdown(&self) {
        if let Some(transport) = self.transport.as_ref() {
            transport.close_port();
        }
        self.sender.lock().take();

        let handle = self.processing_thread.lock().take();
        if let Some(handle) = handle {
            // The last reference may be dropped by the processing thread itself.
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("MIDI processing thread panicked.");
            }
        }
    }

    fn keyboard(&self) -> Option<Arc<dyn KeyboardDisplay>> {
        self.keyboard.read().clone()
    }

    fn controller_area(&self) -> Option<Arc<dyn ControllerDisplay>> {
        self.controller_area.read().clone()
    }

    fn notify(&self, notification: Notification) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }
}

impl Drop for MidiDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use std::{
        error::Error,
        sync::atomic::{AtomicBool, Ordering},
        time::{Duration, Instant},
    };

    use super::*;
    use crate::{
        midi::test::Transport as MockTransport,
        synth::mock::{Call, Synth as MockSynth},
        testutil::eventually,
    };

    struct Fixture {
        device: Arc<MidiDevice>,
        settings: Arc<Settings>,
        synth: Arc<MockSynth>,
        notifications: Receiver<Notification>,
    }

    impl Fixture {
        fn new() -> Fixture {
            let settings = Arc::new(Settings::new());
            let synth = Arc::new(MockSynth::new());
            let device = MidiDevice::new(settings.clone(), synth.clone(), None);
            let notifications = device.subscribe();
            Fixture {
                device,
                settings,
                synth,
                notifications,
            }
        }

        fn key_events(&self) -> Vec<(i32, i32)> {
            self.device.wait_idle();
            self.notifications
                .try_iter()
                .filter_map(|notification| match notification {
                    Notification::KeyPlayed { key, velocity } => Some((key, velocity)),
                    _ => None,
                })
                .collect()
        }

        fn bend_sensitivities(&self) -> Vec<f64> {
            self.device.wait_idle();
            self.notifications
                .try_iter()
                .filter_map(|notification| match notification {
                    Notification::BendSensitivityChanged(semitones) => Some(semitones),
                    _ => None,
                })
                .collect()
        }

        fn all_notifications(&self) -> Vec<Notification> {
            self.device.wait_idle();
            self.notifications.try_iter().collect()
        }
    }

    #[derive(Default)]
    struct RecordingKeyboard {
        events: Mutex<Vec<String>>,
    }

    impl KeyboardDisplay for RecordingKeyboard {
        fn note_on(&self, key: i32, velocity: i32) {
            self.events.lock().push(format!("on {} {}", key, velocity));
        }

        fn note_off(&self, key: i32) {
            self.events.lock().push(format!("off {}", key));
        }

        fn clear(&self) {
            self.events.lock().push("clear".to_string());
        }
    }

    /// A keyboard that stalls the processing thread in `note_on` until `gate` is released.
    #[derive(Default)]
    struct StallingKeyboard {
        gate: Mutex<()>,
        entered: AtomicBool,
    }

    impl KeyboardDisplay for StallingKeyboard {
        fn note_on(&self, _key: i32, _velocity: i32) {
            self.entered.store(true, Ordering::SeqCst);
            let _gate = self.gate.lock();
        }

        fn note_off(&self, _key: i32) {}

        fn clear(&self) {}
    }

    #[derive(Default)]
    struct RecordingControllerArea {
        controllers: Mutex<Vec<(i32, i32)>>,
        bends: Mutex<Vec<i32>>,
    }

    impl ControllerDisplay for RecordingControllerArea {
        fn update_controller(&self, controller: i32, value: i32) {
            self.controllers.lock().push((controller, value));
        }

        fn update_mono_pressure(&self, _value: i32) {}

        fn update_bend(&self, value: i32) {
            self.bends.lock().push(value);
        }

        fn update_bend_sensitivity(&self, _semitones: f64) {}
    }

    /// A keyboard that plays a key back into the device from its own callback.
    struct EchoKeyboard {
        device: Mutex<Option<Weak<MidiDevice>>>,
    }

    impl KeyboardDisplay for EchoKeyboard {
        fn note_on(&self, key: i32, velocity: i32) {
            let device = self.device.lock().as_ref().and_then(Weak::upgrade);
            if let Some(device) = device {
                device.process_key_on(key + 12, velocity, false);
            }
        }

        fn note_off(&self, _key: i32) {}

        fn clear(&self) {}
    }

    #[test]
    fn test_sustain_round_trip() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        device.process_key_on(60, 100, true);
        device.process_controller_changed(64, 127, true);
        device.wait_idle();
        assert!(device.is_sustain_on());
        device.process_key_off(60, true);
        device.process_key_off(60, true);
        assert_eq!(vec![(60, 100)], fixture.key_events());

        device.process_controller_changed(64, 0, true);
        assert_eq!(vec![(60, 0)], fixture.key_events());
        assert!(!device.is_sustain_on());

        // The queue was flushed: releasing the pedal again produces nothing.
        device.process_controller_changed(64, 0, true);
        assert!(fixture.key_events().is_empty());
    }

    #[test]
    fn test_sustain_releases_oldest_first() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        device.process_controller_changed(64, 64, true);
        for key in [62, 60, 64] {
            device.process_key_on(key, 90, true);
            device.process_key_off(key, true);
        }
        fixture.key_events();

        device.process_controller_changed(64, 63, true);
        assert_eq!(vec![(62, 0), (60, 0), (64, 0)], fixture.key_events());
    }

    #[test]
    fn test_retrigger_sustained_key() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        device.process_controller_changed(64, 127, true);
        device.process_key_on(60, 100, true);
        device.process_key_off(60, true);
        device.process_key_on(60, 90, true);
        assert_eq!(vec![(60, 100), (60, 0), (60, 90)], fixture.key_events());

        // The retriggered key is no longer held.
        device.process_controller_changed(64, 0, true);
        assert!(fixture.key_events().is_empty());
    }

    #[test]
    fn test_controller_state_is_applied_before_notifying() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        for (controller, value) in [(64, 127), (7, 127), (64, 0), (7, 0)] {
            device.process_controller_changed(controller, value, true);
            let notification = fixture
                .notifications
                .recv_timeout(Duration::from_secs(5))
                .expect("no notification");
            assert_eq!(
                Notification::ControllerChanged { controller, value },
                notification
            );

            // Checked before the processing thread is given any more work.
            assert_eq!(Some(value), device.controller_value(controller));
            match controller {
                64 => assert_eq!(value >= 64, device.is_sustain_on()),
                _ => {
                    let gain = fixture.settings.get_f64(Section::SoundEngine, "gain", 0.0);
                    let expected = if value == 127 { 50.5 } else { -50.5 };
                    assert!((gain - expected).abs() < 1e-9, "gain {}", gain);
                }
            }
        }
    }

    #[test]
    fn test_sustain_release_follows_controller_notification() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        device.process_controller_changed(64, 127, true);
        device.process_key_on(60, 100, true);
        device.process_key_off(60, true);
        fixture.all_notifications();

        device.process_controller_changed(64, 0, true);
        assert_eq!(
            vec![
                Notification::ControllerChanged {
                    controller: 64,
                    value: 0
                },
                Notification::KeyPlayed {
                    key: 60,
                    velocity: 0
                },
            ],
            fixture.all_notifications()
        );
    }

    #[test]
    fn test_velocity_zero_is_release() {
        let fixture = Fixture::new();
        fixture.device.process_raw_message(&[0x90, 60, 100]);
        fixture.device.process_raw_message(&[0x90, 60, 0]);
        fixture.device.process_raw_message(&[0x80, 61, 64]);
        assert_eq!(vec![(60, 100), (60, 0), (61, 0)], fixture.key_events());
    }

    #[test]
    fn test_poly_pressure_message() {
        let fixture = Fixture::new();
        fixture.device.process_raw_message(&[0xA0, 60, 42]);
        assert_eq!(
            vec![Notification::PolyPressureChanged {
                key: 60,
                pressure: 42
            }],
            fixture.all_notifications()
        );
        // Key pressure is never stored.
        assert_eq!(None, fixture.device.mono_pressure_value());
    }

    #[test]
    fn test_program_change_is_ignored() {
        let fixture = Fixture::new();
        fixture.device.process_raw_message(&[0xC0, 5]);
        fixture.device.process_raw_message(&[0xF8]);
        fixture.device.process_raw_message(&[0x42]);
        assert!(fixture.all_notifications().is_empty());
        assert!(fixture.synth.calls().is_empty());
    }

    #[test]
    fn test_rpn_bend_sensitivity() {
        let fixture = Fixture::new();
        let device = &fixture.device;

        for (controller, value) in [(101, 0), (100, 0), (6, 12), (38, 50)] {
            device.process_controller_changed(controller, value, true);
        }
        assert_eq!(vec![12.5], fixture.bend_sensitivities());
        assert_eq!(Some(12.5), device.bend_sensitivity_value());
    }

    #[test]
    fn test_rpn_reordered_or_incomplete() {
        let sequences: [&[(i32, i32)]; 4] = [
            &[(100, 0), (101, 0), (6, 12), (38, 50)],
            &[(101, 0), (100, 0), (38, 50), (6, 12)],
            &[(101, 0), (6, 12), (38, 50)],
            &[(101, 0), (100, 1), (6, 12), (38, 50)],
        ];
        for sequence in sequences {
            let fixture = Fixture::new();
            for (controller, value) in sequence {
                fixture
                    .device
                    .process_controller_changed(*controller, *value, true);
            }
            assert!(fixture.bend_sensitivities().is_empty(), "{:?}", sequence);
            assert_eq!(None, fixture.device.bend_sensitivity_value());
        }
    }

    #[test]
    fn test_rpn_history_rolls() {
        let fixture = Fixture::new();
        for (controller, value) in [(6, 1), (38, 1), (101, 0), (100, 0), (6, 2), (38, 0)] {
            fixture
                .device
                .process_controller_changed(controller, value, true);
        }
        assert_eq!(vec![2.0], fixture.bend_sensitivities());
    }

    #[test]
    fn test_volume_writes_gain() {
        let fixture = Fixture::new();
        fixture.device.process_controller_changed(7, 127, true);
        fixture.device.wait_idle();
        let gain = fixture.settings.get_f64(Section::SoundEngine, "gain", 0.0);
        assert!((gain - 50.5).abs() < 1e-9);

        fixture.device.process_controller_changed(7, 0, true);
        fixture.device.wait_idle();
        let gain = fixture.settings.get_f64(Section::SoundEngine, "gain", 0.0);
        assert!((gain + 50.5).abs() < 1e-9);
        assert_eq!(Some(0), fixture.device.controller_value(7));
    }

    #[test]
    fn test_key_off_minus_one_stops_preview() {
        let fixture = Fixture::new();
        fixture.device.process_key_off(-1, true);
        assert!(fixture.key_events().is_empty());
        assert_eq!(
            vec![Call::Play {
                id: None,
                key: -1,
                velocity: 0
            }],
            fixture.synth.calls()
        );
    }

    #[test]
    fn test_stop_all() {
        let fixture = Fixture::new();
        let keyboard = Arc::new(RecordingKeyboard::default());
        fixture.device.set_keyboard(keyboard.clone());

        fixture.device.process_controller_changed(64, 127, true);
        fixture.device.process_key_on(60, 100, false);
        fixture.device.process_key_off(60, false);
        fixture.device.process_key_on(64, 100, false);
        fixture.device.process_key_off(64, false);
        fixture.key_events();

        fixture.device.stop_all();
        assert_eq!(vec![(60, 0), (64, 0)], fixture.key_events());
        assert_eq!(vec![Call::Stop], fixture.synth.calls());
        assert_eq!(
            vec!["off 60", "off 64", "clear"],
            keyboard.events.lock().clone()
        );

        // Sustain is still on but nothing is held anymore.
        fixture.device.process_controller_changed(64, 0, true);
        assert!(fixture.key_events().is_empty());
    }

    #[test]
    fn test_display_sync() {
        let fixture = Fixture::new();
        let keyboard = Arc::new(RecordingKeyboard::default());
        let controller_area = Arc::new(RecordingControllerArea::default());
        fixture.device.set_keyboard(keyboard.clone());
        fixture.device.set_controller_area(controller_area.clone());

        fixture.device.process_key_on(60, 100, true);
        fixture.device.process_key_on(62, 100, false);
        fixture.device.process_controller_changed(1, 10, true);
        fixture.device.process_controller_changed(1, 20, false);
        fixture.device.process_bend_changed(8192, false);
        fixture.device.process_bend_changed(0, true);
        fixture.device.wait_idle();

        assert_eq!(vec!["on 60 100"], keyboard.events.lock().clone());
        assert_eq!(vec![(1, 10)], controller_area.controllers.lock().clone());
        assert_eq!(vec![0], controller_area.bends.lock().clone());
        assert_eq!(Some(20), fixture.device.controller_value(1));
        assert_eq!(Some(0), fixture.device.bend_value());
    }

    #[test]
    fn test_display_callback_can_play_keys() {
        let fixture = Fixture::new();
        let keyboard = Arc::new(EchoKeyboard {
            device: Mutex::new(Some(Arc::downgrade(&fixture.device))),
        });
        fixture.device.set_keyboard(keyboard);

        // The echoed key is applied from within the callback, before the original key.
        fixture.device.process_raw_message(&[0x90, 48, 80]);
        assert_eq!(vec![(60, 80), (48, 80)], fixture.key_events());
    }

    #[test]
    fn test_values_and_modulation_context() {
        let fixture = Fixture::new();
        let device = &fixture.device;
        assert_eq!(None, device.controller_value(1));
        assert_eq!(None, device.bend_value());
        assert_eq!(None, device.mono_pressure_value());

        device.process_raw_message(&[0xB0, 1, 90]);
        device.process_raw_message(&[0xD0, 33]);
        device.process_raw_message(&[0xE0, 0x00, 0x50]);
        device.wait_idle();

        assert_eq!(Some(90), device.controller_value(1));
        assert_eq!(Some(33), device.mono_pressure_value());
        assert_eq!(Some(0x50 << 7), device.bend_value());

        let context = device.modulation_context(60, 100);
        assert_eq!(90, context.controller(1));
        assert_eq!(33, context.channel_pressure);
        assert_eq!(0x50 << 7, context.pitch_wheel as i32);
        assert_eq!(2.0, context.bend_sensitivity);
    }

    #[test]
    fn test_transport_messages_are_processed_in_order() -> Result<(), Box<dyn Error>> {
        let settings = Arc::new(Settings::new());
        settings.set(Section::Midi, "index_port", 1i64);
        let transport = Arc::new(MockTransport::get("mock"));
        let device = MidiDevice::new(
            settings,
            Arc::new(MockSynth::new()),
            Some(transport.clone()),
        );
        let notifications = device.subscribe();
        assert_eq!(Some(1), transport.opened_port());
        assert_eq!(2, device.port_names().len());

        for raw_message in [
            [0xB0, 64, 127],
            [0x90, 60, 100],
            [0x80, 60, 0],
            [0xB0, 64, 0],
        ] {
            assert!(transport.mock_event(&raw_message));
        }

        let received = Mutex::new(Vec::new());
        eventually(
            || {
                received.lock().extend(notifications.try_iter().filter_map(|n| match n {
                    Notification::KeyPlayed { key, velocity } => Some((key, velocity)),
                    _ => None,
                }));
                received.lock().len() == 2
            },
            "Key events were never received",
        );
        assert_eq!(vec![(60, 100), (60, 0)], received.lock().clone());

        device.open_port(-1);
        assert_eq!(None, transport.opened_port());
        assert!(!transport.mock_event(&[0x90, 60, 100]));

        device.open_port(5);
        assert_eq!(None, transport.opened_port());

        device.shutdown();
        Ok(())
    }

    #[test]
    fn test_full_queue_drops_transport_messages() {
        let settings = Arc::new(Settings::new());
        settings.set(Section::Midi, "index_port", 0i64);
        let transport = Arc::new(MockTransport::get("mock"));
        let device = MidiDevice::new(
            settings,
            Arc::new(MockSynth::new()),
            Some(transport.clone()),
        );
        let keyboard = Arc::new(StallingKeyboard::default());
        device.set_keyboard(keyboard.clone());
        let notifications = device.subscribe();

        let gate = keyboard.gate.lock();
        assert!(transport.mock_event(&[0x90, 60, 100]));
        eventually(
            || keyboard.entered.load(Ordering::SeqCst),
            "Processing thread never reached the keyboard",
        );

        // The processing thread is stalled: the callback must keep returning.
        let start = Instant::now();
        let accepted = (0..MESSAGE_QUEUE_SIZE + 100)
            .filter(|_| transport.mock_event(&[0xB0, 1, 1]))
            .count();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(MESSAGE_QUEUE_SIZE, accepted);

        drop(gate);
        device.wait_idle();
        let controllers = notifications
            .try_iter()
            .filter(|n| matches!(n, Notification::ControllerChanged { .. }))
            .count();
        assert_eq!(MESSAGE_QUEUE_SIZE, controllers);
        device.shutdown();
    }

    #[test]
    fn test_shutdown_applies_queued_messages() {
        let fixture = Fixture::new();
        for key in 0..100 {
            fixture.device.process_key_on(key, 100, true);
        }
        fixture.device.shutdown();

        let keys = fixture
            .notifications
            .try_iter()
            .filter(|n| matches!(n, Notification::KeyPlayed { .. }))
            .count();
        assert_eq!(100, keys);

        // Nothing is applied after shutdown.
        fixture.device.process_key_on(1, 100, true);
        fixture.device.wait_idle();
        assert!(fixture.notifications.try_iter().next().is_none());
    }
}
