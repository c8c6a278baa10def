/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
use core::time::Duration;
use std::sync::Arc;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use sharpkey_core::config::Config;
use sharpkey_core::engine::{
    while_suspended, Action, HostTarget, KeyEvent, KeyMapEngine, KeyMapping, KeyMapPersistence
};
use sharpkey_core::keymap::KeyMap;
use sharpkey_core::scancode::ScanCode;
use sharpkey_core::source::ScanCodeSource;
use sharpkey_core::status::{LedPattern, StatusIndicator};
use sharpkey_core::store::{load_keymap_or_builtin, ConfigStore, StoreResult, TableStore};

use super::keytable::Pc98Action;
use super::{machine, Pc9801, Pc98Shared};

/// How long to wait for space in the transmit queue before a word is dropped.
pub const QUEUE_TIMEOUT: Duration = Duration::from_millis(10);
/// How long [Pc98Keyboard::run] waits for a scan code before checking the shutdown flag.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);
/// How long to wait for the real-time driver to suspend.
pub const SUSPEND_TIMEOUT: Duration = Duration::from_millis(500);

/// The PC-9801 acquisition loop.
///
/// Pushes the words of mapped scan codes to the transmit queue and logs commands received
/// from the host. Configuration changes are persisted while no key is down and the transmit
/// queue is empty.
pub struct Pc98Keyboard<S, St, I> {
    engine: KeyMapEngine<Pc9801>,
    shared: Arc<Pc98Shared>,
    source: S,
    store: St,
    indicator: I,
    /// Keys currently down, by their scan code.
    pressed: Vec<u8>,
    dropped: u64,
}

impl<S, St, I> Pc98Keyboard<S, St, I>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator
{
    /// Creates the keyboard, loading the configuration and the key map from `store`.
    ///
    /// This must be called before the real-time driver is started.
    pub fn new(source: S, mut store: St, indicator: I, shared: Arc<Pc98Shared>) -> Self {
        let engine = KeyMapEngine::<Pc9801>::load(&mut store);
        info!("{}: emulating {}", Pc9801::NAME, machine::name(engine.config().active_machine_model));
        Pc98Keyboard { engine, shared, source, store, indicator, pressed: Vec::new(), dropped: 0 }
    }
    #[inline]
    pub fn engine(&self) -> &KeyMapEngine<Pc9801> {
        &self.engine
    }
    #[inline]
    pub fn shared(&self) -> &Arc<Pc98Shared> {
        &self.shared
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut St {
        &mut self.store
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
    /// The number of words dropped due to a full transmit queue.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
    /// Returns `true` if no key is down.
    pub fn is_idle(&self) -> bool {
        self.pressed.is_empty()
    }
    /// Reads and processes a single scan code, logs host commands, then persists a changed
    /// configuration if no key is down.
    ///
    /// Returns `true` if a scan code was processed.
    pub fn poll(&mut self, timeout: Option<Duration>) -> bool {
        let scan = self.source.read(timeout);
        if let Some(scan) = scan {
            self.process_scan_code(scan);
        }
        while let Some(byte) = self.shared.rcv.try_pop() {
            debug!("{}: host command {:#04x}", Pc9801::NAME, byte);
        }
        self.persist_config_if_idle();
        scan.is_some()
    }
    /// Runs the acquisition loop until the driver is shut down.
    pub fn run(&mut self) {
        while !self.shared.handshake.is_shutdown() {
            self.poll(Some(READ_TIMEOUT));
        }
    }

    fn send(&mut self, word: u32) {
        if let Err(err) = self.shared.xmit.push_timeout(word, QUEUE_TIMEOUT) {
            warn!("{}: word {:#08x} dropped: {}", Pc9801::NAME, err.0, err);
            self.dropped += 1;
        }
    }

    fn apply(&mut self, event: KeyEvent, actions: &[Pc98Action]) {
        for action in actions.iter() {
            match event {
                KeyEvent::Make => {
                    for word in action.make_words() {
                        self.send(word);
                    }
                }
                KeyEvent::Break => self.send(action.break_word())
            }
        }
    }

    fn track(&mut self, scan: ScanCode) {
        let pos = self.pressed.iter().position(|&code| code == scan.code);
        match (scan.is_make(), pos) {
            (true, None) => self.pressed.push(scan.code),
            (false, Some(index)) => { self.pressed.swap_remove(index); }
            _ => {}
        }
    }

    fn persist_config_if_idle(&mut self) {
        if !self.engine.state().config_dirty || !self.is_idle() || !self.shared.xmit.is_empty() {
            return
        }
        if let Err(err) = self.engine.persist_config(&mut self.store, &self.shared.handshake, SUSPEND_TIMEOUT) {
            warn!("{}: configuration not saved: {}", Pc9801::NAME, err);
            self.indicator.show(LedPattern::WARNING);
        }
    }
}

impl<S, St, I> KeyMapping for Pc98Keyboard<S, St, I>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator
{
    fn process_scan_code(&mut self, scan: ScanCode) {
        self.track(scan);
        let was_armed = self.engine.state().option_select_armed;
        let mut applied = false;
        match self.engine.map(scan) {
            Action::None => {}
            Action::OptionApplied { changed, .. } => applied = changed,
            Action::Update { event, actions } => {
                if event == KeyEvent::Make {
                    self.indicator.show(LedPattern::ACTIVITY);
                }
                self.apply(event, &actions);
            }
        }
        let armed = self.engine.state().option_select_armed;
        if armed && !was_armed {
            self.indicator.show(LedPattern::OPTION_ARMED);
        }
        else if was_armed && !armed {
            self.indicator.show(if applied { LedPattern::OPTION_APPLIED } else { LedPattern::OFF });
        }
    }

    fn config(&self) -> Config {
        self.engine.config()
    }
}

impl<S, St, I> KeyMapPersistence for Pc98Keyboard<S, St, I>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator
{
    fn reload_keymap(&mut self) {
        let store = &mut self.store;
        let res = while_suspended(&self.shared.handshake, SUSPEND_TIMEOUT, || {
            Ok(load_keymap_or_builtin(store, Pc9801::KEYMAP_FILE, Pc9801::builtin_keymap()))
        });
        match res {
            Ok(keymap) => self.engine.set_keymap(keymap),
            Err(err) => warn!("{}: key map not reloaded: {}", Pc9801::NAME, err)
        }
    }

    fn save_keymap(&mut self) -> StoreResult<()> {
        let data = self.engine.keymap().to_bytes();
        let store = &mut self.store;
        while_suspended(&self.shared.handshake, SUSPEND_TIMEOUT, || {
            store.write_table(Pc9801::KEYMAP_FILE, &data)
        })
    }

    fn factory_reset(&mut self) -> StoreResult<()> {
        info!("{}: factory reset", Pc9801::NAME);
        self.engine.set_config(Pc9801::DEFAULT_CONFIG);
        self.engine.set_keymap(KeyMap::from_builtin(Pc9801::builtin_keymap()));
        self.save_keymap()
    }
}
