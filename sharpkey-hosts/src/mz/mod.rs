/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The Sharp MZ-2500/MZ-2800 keyboard interface.
//!
//! The host scans a 15×8 key matrix: it asserts a strobe line with a 4-bit row number on the
//! row address lines and expects the row's data on the output port before it samples it.
//! With the "row data required" line deasserted, the host expects all rows ANDed together
//! instead, to cheaply poll whether any key is down.
//!
//! [MzKeyboard] runs the acquisition loop updating the [KeyMatrix] and publishing it to the
//! [MirrorMatrix] shared with the [MatrixDriver], which serves the host in real time.
use core::sync::atomic::{AtomicU8, Ordering};

use sharpkey_core::config::Config;
use sharpkey_core::engine::HostTarget;
use sharpkey_core::keymap::{self, KeyMapEntry};
use sharpkey_core::scancode::ps2key;
use sharpkey_core::sync::SuspendHandshake;

mod driver;
mod keyboard;
mod keytable;
pub mod matrix;

pub use driver::*;
pub use keyboard::*;
pub use keytable::*;
pub use matrix::{KeyMatrix, MatrixTarget, MirrorMatrix};

/// Emulated machine models, each a single bit of the `machines` mask of a key map row.
pub mod machine {
    pub const MZ_80B:  u8 = 0x01;
    pub const MZ_2000: u8 = 0x02;
    pub const MZ_2500: u8 = 0x04;
    pub const MZ_2800: u8 = 0x08;
    /// All the defined machine model bits.
    pub const ALL_BITS: u8 = MZ_80B|MZ_2000|MZ_2500|MZ_2800;

    /// Returns `true` if `model` is a machine mode of the MZ-2500 hardware.
    #[inline]
    pub fn is_mz2500_mode(model: u8) -> bool {
        model & (MZ_80B|MZ_2000|MZ_2500) != 0
    }

    pub fn name(model: u8) -> &'static str {
        match model {
            MZ_80B  => "MZ-80B",
            MZ_2000 => "MZ-2000",
            MZ_2500 => "MZ-2500",
            MZ_2800 => "MZ-2800",
            _ => "Unknown"
        }
    }
}

/// The MZ-2500/MZ-2800 host target.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Mz2528;

impl HostTarget for Mz2528 {
    type Action = MzAction;
    const NAME: &'static str = "mz2528";
    const KEYMAP_FILE: &'static str = "mz2528.bin";
    const DEFAULT_CONFIG: Config = Config::new(keymap::keyboard::UK_WYSE_KB3926, machine::MZ_2500);
    const MACHINE_BITS: u8 = machine::ALL_BITS;

    fn builtin_keymap() -> &'static [KeyMapEntry<MzAction>] {
        &KEYMAP
    }
    /// * `0`-`7` select the keyboard model.
    /// * `8` selects the MZ-2500, `9` the MZ-2800.
    /// * `End`, `Down` and `PgDn` select the MZ-80B, MZ-2000 and MZ-2500 modes, only if
    ///   the MZ-2500 hardware is active.
    fn select_option(code: u8, config: &mut Config) -> bool {
        let prev = *config;
        match (code, ps2key::digit(code)) {
            (_, Some(n @ 0..=7)) => config.active_keyboard_model = 1 << n,
            (_, Some(8)) => config.active_machine_model = machine::MZ_2500,
            (_, Some(9)) => config.active_machine_model = machine::MZ_2800,
            (ps2key::END, _)|(ps2key::DN_ARROW, _)|(ps2key::PGDN, _)
                if machine::is_mz2500_mode(config.active_machine_model) =>
            {
                config.active_machine_model = match code {
                    ps2key::END => machine::MZ_80B,
                    ps2key::DN_ARROW => machine::MZ_2000,
                    _ => machine::MZ_2500
                };
            }
            _ => {}
        }
        *config != prev
    }
}

/// The state shared between [MzKeyboard] and [MatrixDriver].
#[derive(Debug)]
pub struct MzShared {
    pub mirror: MirrorMatrix,
    pub handshake: SuspendHandshake,
    machine: AtomicU8,
}

impl MzShared {
    pub fn new(machine_model: u8) -> Self {
        MzShared {
            mirror: MirrorMatrix::new(),
            handshake: SuspendHandshake::new(),
            machine: AtomicU8::new(machine_model)
        }
    }
    /// The active machine model, determining the host timing.
    #[inline]
    pub fn machine_model(&self) -> u8 {
        self.machine.load(Ordering::Relaxed)
    }

    pub fn set_machine_model(&self, machine_model: u8) {
        self.machine.store(machine_model, Ordering::Relaxed)
    }
}

impl Default for MzShared {
    fn default() -> Self {
        MzShared::new(Mz2528::DEFAULT_CONFIG.active_machine_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(code: u8, config: Config) -> (bool, Config) {
        let mut config = config;
        let changed = Mz2528::select_option(code, &mut config);
        (changed, config)
    }

    #[test]
    fn mz_options() {
        let config = Mz2528::DEFAULT_CONFIG;
        assert_eq!(select(ps2key::N3, config), (true, Config::new(0x08, machine::MZ_2500)));
        assert_eq!(select(ps2key::N0, config), (false, config));
        assert_eq!(select(ps2key::N9, config), (true, Config::new(0x01, machine::MZ_2800)));
        assert_eq!(select(ps2key::N8, config), (false, config));
        assert_eq!(select(ps2key::END, config), (true, Config::new(0x01, machine::MZ_80B)));
        assert_eq!(select(ps2key::DN_ARROW, config), (true, Config::new(0x01, machine::MZ_2000)));
        let mz80b = Config::new(0x01, machine::MZ_80B);
        assert_eq!(select(ps2key::PGDN, mz80b), (true, config));
        // no MZ-2500 modes on the MZ-2800
        let mz2800 = Config::new(0x01, machine::MZ_2800);
        assert_eq!(select(ps2key::END, mz2800), (false, mz2800));
        assert_eq!(select(ps2key::DN_ARROW, mz2800), (false, mz2800));
        assert_eq!(select(ps2key::PGDN, mz2800), (false, mz2800));
        assert_eq!(select(ps2key::N8, mz2800), (true, config));
        assert_eq!(select(ps2key::A, config), (false, config));
    }
}
