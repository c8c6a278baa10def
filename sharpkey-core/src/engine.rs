/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The key mapping engine.
//!
//! [KeyMapEngine] maps a single [ScanCode] at a time to the host specific actions found in
//! its [KeyMap], keeping track of the option select meta-sequence and the active models.
//!
//! The option select sequence: pressing `Ctrl+Shift+Esc` arms the sequence, the next key
//! press (other than `Esc`) is then interpreted by [HostTarget::select_option] instead of
//! being mapped. Any key release in between cancels the sequence.
use core::fmt;
use core::time::Duration;

use arrayvec::ArrayVec;
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use crate::config::Config;
use crate::keymap::{KeyMap, KeyMapEntry, RecordAction};
use crate::scancode::{ps2key, KeyFlags, ScanCode};
use crate::store::{load_keymap_or_builtin, ConfigStore, StoreError, StoreResult, TableStore};
use crate::sync::SuspendHandshake;

/// The maximum number of rows applied for a single scan code.
pub const MAX_ACTIONS: usize = 16;

/// Host target specific parameters of the mapping engine.
pub trait HostTarget {
    /// The action of a key map row.
    type Action: RecordAction + Copy + fmt::Debug + 'static;
    /// The configuration key in a [ConfigStore].
    const NAME: &'static str;
    /// The key map override file in a [TableStore].
    const KEYMAP_FILE: &'static str;
    const DEFAULT_CONFIG: Config;
    /// All machine model bits defined by this target.
    const MACHINE_BITS: u8;

    /// Returns the built-in key map.
    fn builtin_keymap() -> &'static [KeyMapEntry<Self::Action>];
    /// Interprets a key `code` of the option select sequence.
    ///
    /// Returns `true` if the `config` has been changed.
    fn select_option(code: u8, config: &mut Config) -> bool;
}

/// Capability of a keyboard interface to translate scan codes to its host's protocol.
pub trait KeyMapping {
    /// Processes a single scan code, updating the host output state.
    fn process_scan_code(&mut self, scan: ScanCode);
    /// Returns the current configuration.
    fn config(&self) -> Config;
}

/// Capability of a keyboard interface to persist its key map.
pub trait KeyMapPersistence {
    /// Reloads the key map override from the table store.
    fn reload_keymap(&mut self);
    /// Writes the key map currently in use to the table store.
    fn save_keymap(&mut self) -> StoreResult<()>;
    /// Restores the default configuration and the built-in key map, also in the stores.
    fn factory_reset(&mut self) -> StoreResult<()>;
}

/// The mutable state of the mapping engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineState {
    pub config: Config,
    /// Set by `Ctrl+Shift+Esc`, cleared by the next key press or any key release.
    pub option_select_armed: bool,
    /// The configuration has been changed and needs to be persisted.
    pub config_dirty: bool,
}

impl EngineState {
    pub fn new(config: Config) -> Self {
        EngineState { config, option_select_armed: false, config_dirty: false }
    }
}

/// The kind of a key event an [Action::Update] originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Make,
    Break
}

/// The outcome of mapping a single scan code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action<A> {
    /// Nothing to do.
    None,
    /// Apply actions of the matching rows, in table order.
    Update { event: KeyEvent, actions: ArrayVec<A, MAX_ACTIONS> },
    /// An option select command key was consumed.
    OptionApplied { code: u8, changed: bool },
}

impl<A> Action<A> {
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Action::None)
    }
}

/// The table driven key mapping engine of a host target.
pub struct KeyMapEngine<T: HostTarget> {
    keymap: KeyMap<T::Action>,
    state: EngineState,
}

impl<T: HostTarget> fmt::Debug for KeyMapEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMapEngine")
         .field("target", &T::NAME)
         .field("rows", &self.keymap.len())
         .field("state", &self.state)
         .finish()
    }
}

impl<T: HostTarget> KeyMapEngine<T> {
    pub fn new(keymap: KeyMap<T::Action>, config: Config) -> Self {
        KeyMapEngine { keymap, state: EngineState::new(config) }
    }
    /// Creates an engine with the built-in key map and the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(KeyMap::from_builtin(T::builtin_keymap()), T::DEFAULT_CONFIG)
    }
    /// Creates an engine loading the configuration and the key map from the stores.
    ///
    /// This must be called before the real-time driver is started.
    ///
    /// A missing or corrupted configuration is replaced with the default one which is then
    /// marked dirty.
    pub fn load<S: ConfigStore + TableStore>(store: &mut S) -> Self {
        let stored = store.load(T::NAME).and_then(|data| Config::from_bytes(&data));
        let (config, dirty) = match stored {
            Some(config) => (config, false),
            None => {
                warn!("{}: no valid configuration, using defaults", T::NAME);
                (T::DEFAULT_CONFIG, true)
            }
        };
        info!("{}: {}", T::NAME, config);
        let keymap = load_keymap_or_builtin(store, T::KEYMAP_FILE, T::builtin_keymap());
        let mut engine = Self::new(keymap, config);
        engine.state.config_dirty = dirty;
        engine
    }

    #[inline]
    pub fn state(&self) -> &EngineState {
        &self.state
    }
    #[inline]
    pub fn config(&self) -> Config {
        self.state.config
    }
    #[inline]
    pub fn keymap(&self) -> &KeyMap<T::Action> {
        &self.keymap
    }

    pub fn set_keymap(&mut self, keymap: KeyMap<T::Action>) {
        self.keymap = keymap;
    }
    /// Replaces the configuration and marks it dirty.
    pub fn set_config(&mut self, config: Config) {
        self.state.config = config;
        self.state.config_dirty = true;
    }
    /// Maps a single scan code.
    pub fn map(&mut self, scan: ScanCode) -> Action<T::Action> {
        let state = &mut self.state;
        if scan.is_make() {
            if state.option_select_armed && scan.code != ps2key::ESC {
                state.option_select_armed = false;
                let changed = T::select_option(scan.code, &mut state.config);
                if changed {
                    info!("{}: option {} selected: {}", T::NAME, scan, state.config);
                    state.config_dirty = true;
                }
                else {
                    debug!("{}: option {} ignored", T::NAME, scan);
                }
                return Action::OptionApplied { code: scan.code, changed }
            }
            if !state.option_select_armed && scan.code == ps2key::ESC
               && scan.flags.contains(KeyFlags::CTRL|KeyFlags::SHIFT) {
                debug!("{}: option select armed", T::NAME);
                state.option_select_armed = true;
                return Action::None
            }
        }
        else if state.option_select_armed {
            debug!("{}: option select cancelled", T::NAME);
            state.option_select_armed = false;
        }

        let Config { active_keyboard_model, active_machine_model } = state.config;
        let mut actions = ArrayVec::new();
        for m in self.keymap.matches(scan, active_keyboard_model, active_machine_model) {
            trace!("{}: {} row {} {:?}", T::NAME, scan, m.index, m.kind);
            if actions.try_push(m.entry.action).is_err() {
                warn!("{}: {} matches too many rows", T::NAME, scan);
                break
            }
        }
        if actions.is_empty() {
            trace!("{}: {} not mapped", T::NAME, scan);
            return Action::None
        }
        let event = if scan.is_break() { KeyEvent::Break } else { KeyEvent::Make };
        Action::Update { event, actions }
    }
    /// Persists a dirty configuration while the real-time driver is suspended.
    ///
    /// The dirty flag is cleared even if persisting fails, so a broken store isn't retried
    /// on every key. Returns `Ok(false)` if the configuration wasn't dirty.
    pub fn persist_config<C: ConfigStore>(
            &mut self,
            store: &mut C,
            handshake: &SuspendHandshake,
            timeout: Duration
        ) -> StoreResult<bool>
    {
        if !self.state.config_dirty {
            return Ok(false)
        }
        self.state.config_dirty = false;
        let data = self.state.config.to_bytes();
        while_suspended(handshake, timeout, || {
            store.store(T::NAME, &data)?;
            store.commit()
        })?;
        info!("{}: configuration saved", T::NAME);
        Ok(true)
    }
}

/// Runs `f` while the real-time driver is suspended.
///
/// Returns [StoreError::Busy] if the driver doesn't acknowledge the suspension within `timeout`.
pub fn while_suspended<R, F>(handshake: &SuspendHandshake, timeout: Duration, f: F) -> StoreResult<R>
    where F: FnOnce() -> StoreResult<R>
{
    handshake.request_suspend();
    let res = if handshake.wait_suspended(timeout) {
        f()
    }
    else {
        Err(StoreError::Busy)
    };
    handshake.release();
    res
}
