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
use sharpkey_core::scancode::{ps2key, ScanCode};
use sharpkey_core::source::{Delay, ScanCodeSource};
use sharpkey_core::status::{LedPattern, StatusIndicator};
use sharpkey_core::store::{load_keymap_or_builtin, ConfigStore, StoreResult, TableStore};

use super::keytable::MzAction;
use super::matrix::KeyMatrix;
use super::{machine, Mz2528, MzShared};

/// Delay after keys were released by a key press, before the pressed keys become active,
/// so the host samples the intermediate state.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);
/// Delay around the synthetic SHIFT+BREAK sequence of the Pause key.
pub const PAUSE_DELAY: Duration = Duration::from_millis(100);
/// How long [MzKeyboard::run] waits for a scan code before checking the shutdown flag.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);
/// How long to wait for the real-time driver to suspend.
pub const SUSPEND_TIMEOUT: Duration = Duration::from_millis(500);

/// The MZ-2500/MZ-2800 acquisition loop.
///
/// Owns the [KeyMatrix] and the mapping engine, publishes every matrix change to the shared
/// [super::MirrorMatrix] and persists configuration changes while no key is down.
pub struct MzKeyboard<S, St, I, D> {
    engine: KeyMapEngine<Mz2528>,
    matrix: KeyMatrix,
    shared: Arc<MzShared>,
    source: S,
    store: St,
    indicator: I,
    delay: D,
}

impl<S, St, I, D> MzKeyboard<S, St, I, D>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator,
          D: Delay
{
    /// Creates the keyboard, loading the configuration and the key map from `store`.
    ///
    /// This must be called before the real-time driver is started.
    pub fn new(source: S, mut store: St, indicator: I, delay: D, shared: Arc<MzShared>) -> Self {
        let engine = KeyMapEngine::<Mz2528>::load(&mut store);
        let machine_model = engine.config().active_machine_model;
        info!("{}: emulating {}", Mz2528::NAME, machine::name(machine_model));
        let matrix = KeyMatrix::new();
        shared.set_machine_model(machine_model);
        shared.mirror.publish(&matrix);
        shared.handshake.set_yield(true);
        MzKeyboard { engine, matrix, shared, source, store, indicator, delay }
    }
    #[inline]
    pub fn engine(&self) -> &KeyMapEngine<Mz2528> {
        &self.engine
    }
    #[inline]
    pub fn matrix(&self) -> &KeyMatrix {
        &self.matrix
    }
    #[inline]
    pub fn shared(&self) -> &Arc<MzShared> {
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

    pub fn delay(&self) -> &D {
        &self.delay
    }
    /// Reads and processes a single scan code, then persists a changed configuration
    /// if no key is down.
    ///
    /// Returns `true` if a scan code was processed.
    pub fn poll(&mut self, timeout: Option<Duration>) -> bool {
        let scan = self.source.read(timeout);
        if let Some(scan) = scan {
            self.process_scan_code(scan);
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
    /// Releases all keys.
    pub fn release_all(&mut self) {
        self.matrix.release_all();
        self.publish();
    }

    fn publish(&self) {
        self.shared.mirror.publish(&self.matrix);
        self.shared.handshake.set_yield(self.matrix.is_idle());
    }

    fn apply(&mut self, event: KeyEvent, actions: &[MzAction]) {
        for action in actions.iter() {
            match event {
                KeyEvent::Make => {
                    let mut changed = false;
                    for target in action.break_targets() {
                        changed |= self.matrix.set_inactive(target);
                    }
                    if changed {
                        self.publish();
                        self.delay.delay(SETTLE_DELAY);
                    }
                    for target in action.make_targets() {
                        self.matrix.set_active(target);
                    }
                }
                KeyEvent::Break => {
                    for target in action.make_targets() {
                        self.matrix.set_inactive(target);
                    }
                    for target in action.break_targets() {
                        self.matrix.set_active(target);
                    }
                }
            }
        }
    }
    /// The Pause key has no release event of its own, so the whole sequence is emitted
    /// on a key press.
    fn pause(&mut self, actions: &[MzAction]) {
        self.delay.delay(PAUSE_DELAY);
        self.apply(KeyEvent::Make, actions);
        self.publish();
        self.delay.delay(PAUSE_DELAY);
        self.apply(KeyEvent::Break, actions);
    }

    fn persist_config_if_idle(&mut self) {
        if !self.engine.state().config_dirty || !self.matrix.is_idle() {
            return
        }
        if let Err(err) = self.engine.persist_config(&mut self.store, &self.shared.handshake, SUSPEND_TIMEOUT) {
            warn!("{}: configuration not saved: {}", Mz2528::NAME, err);
            self.indicator.show(LedPattern::WARNING);
        }
    }
}

impl<S, St, I, D> KeyMapping for MzKeyboard<S, St, I, D>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator,
          D: Delay
{
    fn process_scan_code(&mut self, scan: ScanCode) {
        let was_armed = self.engine.state().option_select_armed;
        let mut applied = false;
        match self.engine.map(scan) {
            Action::None => {}
            Action::OptionApplied { changed, .. } => {
                if changed {
                    let machine_model = self.engine.config().active_machine_model;
                    self.shared.set_machine_model(machine_model);
                }
                applied = changed;
            }
            Action::Update { event, actions } => {
                if event == KeyEvent::Make {
                    self.indicator.show(LedPattern::ACTIVITY);
                }
                if scan.code == ps2key::PAUSE {
                    if event == KeyEvent::Make {
                        self.pause(&actions);
                    }
                }
                else {
                    self.apply(event, &actions);
                }
            }
        }
        let armed = self.engine.state().option_select_armed;
        if armed && !was_armed {
            self.indicator.show(LedPattern::OPTION_ARMED);
        }
        else if was_armed && !armed {
            self.indicator.show(if applied { LedPattern::OPTION_APPLIED } else { LedPattern::OFF });
        }
        self.publish();
    }

    fn config(&self) -> Config {
        self.engine.config()
    }
}

impl<S, St, I, D> KeyMapPersistence for MzKeyboard<S, St, I, D>
    where S: ScanCodeSource,
          St: ConfigStore + TableStore,
          I: StatusIndicator,
          D: Delay
{
    fn reload_keymap(&mut self) {
        self.release_all();
        let store = &mut self.store;
        let res = while_suspended(&self.shared.handshake, SUSPEND_TIMEOUT, || {
            Ok(load_keymap_or_builtin(store, Mz2528::KEYMAP_FILE, Mz2528::builtin_keymap()))
        });
        match res {
            Ok(keymap) => self.engine.set_keymap(keymap),
            Err(err) => warn!("{}: key map not reloaded: {}", Mz2528::NAME, err)
        }
    }

    fn save_keymap(&mut self) -> StoreResult<()> {
        let data = self.engine.keymap().to_bytes();
        let store = &mut self.store;
        while_suspended(&self.shared.handshake, SUSPEND_TIMEOUT, || {
            store.write_table(Mz2528::KEYMAP_FILE, &data)
        })
    }

    fn factory_reset(&mut self) -> StoreResult<()> {
        info!("{}: factory reset", Mz2528::NAME);
        self.release_all();
        self.engine.set_config(Mz2528::DEFAULT_CONFIG);
        self.engine.set_keymap(KeyMap::from_builtin(Mz2528::builtin_keymap()));
        self.shared.set_machine_model(Mz2528::DEFAULT_CONFIG.active_machine_model);
        self.save_keymap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use sharpkey_core::scancode::KeyFlags;
    use sharpkey_core::source::NoDelay;
    use sharpkey_core::status::PatternLog;
    use sharpkey_core::store::MemoryStore;
    use crate::mz::keytable::mzkey;
    use crate::mz::matrix::{pin_remap, IDLE_WORD};

    type TestKeyboard = MzKeyboard<VecDeque<ScanCode>, MemoryStore, PatternLog, NoDelay>;

    fn keyboard() -> TestKeyboard {
        let shared = Arc::new(MzShared::default());
        MzKeyboard::new(VecDeque::new(), MemoryStore::default(), PatternLog::default(), NoDelay::default(), shared)
    }

    fn is_active(kbd: &TestKeyboard, target: crate::mz::MatrixTarget) -> bool {
        kbd.matrix().row(usize::from(target.row)) & target.bit == 0
    }

    #[test]
    fn shifted_symbol_releases_shift() {
        let mut kbd = keyboard();
        kbd.process_scan_code(ScanCode::make(ps2key::L_SHIFT, KeyFlags::SHIFT));
        assert!(is_active(&kbd, mzkey::SHIFT));
        assert!(!kbd.shared().handshake.yield_requested());
        kbd.process_scan_code(ScanCode::make(ps2key::N6, KeyFlags::SHIFT));
        assert!(!is_active(&kbd, mzkey::SHIFT));
        assert!(is_active(&kbd, mzkey::HAT));
        assert_eq!(kbd.delay().total, SETTLE_DELAY);
        kbd.process_scan_code(ScanCode::release(ps2key::N6, KeyFlags::SHIFT));
        assert!(is_active(&kbd, mzkey::SHIFT));
        assert!(!is_active(&kbd, mzkey::HAT));
        kbd.process_scan_code(ScanCode::release(ps2key::L_SHIFT, KeyFlags::empty()));
        assert!(kbd.matrix().is_idle());
        assert!(kbd.shared().handshake.yield_requested());
        assert!(!kbd.shared().mirror.any_active());
    }

    #[test]
    fn pause_emits_shift_break() {
        let mut kbd = keyboard();
        kbd.process_scan_code(ScanCode::make(ps2key::PAUSE, KeyFlags::empty()));
        assert!(kbd.matrix().is_idle());
        assert_eq!(kbd.delay().total, PAUSE_DELAY * 2);
        kbd.process_scan_code(ScanCode::release(ps2key::PAUSE, KeyFlags::empty()));
        assert!(kbd.matrix().is_idle());
    }

    /// Samples what the real-time driver would serve on every delay.
    struct HostView {
        shared: Arc<MzShared>,
        seen: Vec<(bool, u32, u32)>,
    }

    impl Delay for HostView {
        fn delay(&mut self, _duration: Duration) {
            let served = !self.shared.handshake.yield_requested();
            let shift = self.shared.mirror.row_word(usize::from(mzkey::SHIFT.row));
            let brk = self.shared.mirror.row_word(usize::from(mzkey::BREAK.row));
            self.seen.push((served, shift, brk));
        }
    }

    #[test]
    fn pause_sequence_reaches_host() {
        let shared = Arc::new(MzShared::default());
        let view = HostView { shared: Arc::clone(&shared), seen: Vec::new() };
        let mut kbd = MzKeyboard::new(VecDeque::new(), MemoryStore::default(), PatternLog::default(),
                                      view, shared);
        kbd.process_scan_code(ScanCode::make(ps2key::PAUSE, KeyFlags::empty()));
        let shift = pin_remap(mzkey::SHIFT.bit);
        let brk = pin_remap(mzkey::BREAK.bit);
        let seen = &kbd.delay().seen;
        assert_eq!(seen.len(), 2);
        // idle before the sequence
        assert_eq!(seen[0], (false, IDLE_WORD, IDLE_WORD));
        let (served, shift_word, break_word) = seen[1];
        assert!(served);
        assert_eq!(shift_word & shift, shift);
        assert_eq!(break_word & brk, brk);
        assert!(kbd.matrix().is_idle());
        assert!(kbd.shared().handshake.yield_requested());
        assert!(!kbd.shared().mirror.any_active());
    }

    #[test]
    fn option_select_changes_machine() {
        let mut kbd = keyboard();
        let cs = KeyFlags::CTRL|KeyFlags::SHIFT;
        kbd.process_scan_code(ScanCode::make(ps2key::ESC, cs));
        assert!(kbd.indicator().has_shown(LedPattern::OPTION_ARMED));
        kbd.process_scan_code(ScanCode::make(ps2key::N9, cs));
        assert!(kbd.indicator().has_shown(LedPattern::OPTION_APPLIED));
        assert_eq!(kbd.config().active_machine_model, machine::MZ_2800);
        assert_eq!(kbd.shared().machine_model(), machine::MZ_2800);
        assert!(kbd.matrix().is_idle());
    }

    #[test]
    fn factory_reset_restores_defaults() {
        let mut kbd = keyboard();
        kbd.store_mut().tables.clear();
        kbd.engine.set_config(Config::new(0x02, machine::MZ_2800));
        kbd.engine.set_keymap(KeyMap::new(Vec::new()));
        // no driver running
        assert!(kbd.factory_reset().is_err());
        assert_eq!(kbd.config(), Mz2528::DEFAULT_CONFIG);
        assert_eq!(kbd.engine().keymap().len(), Mz2528::builtin_keymap().len());
        assert!(kbd.engine().state().config_dirty);
        assert!(kbd.store().tables.is_empty());
    }
}
