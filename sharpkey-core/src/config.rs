/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Persistent interface configuration.
use core::fmt;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use crate::keymap::keyboard;

/// The persistent configuration of a host target.
///
/// Persisted as a fixed size binary struct of two bytes, in field order.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// A single bit of the [keyboard] models.
    pub active_keyboard_model: u8,
    /// A single bit of the target machine models.
    pub active_machine_model: u8,
}

impl Config {
    /// The size of the persisted binary struct.
    pub const SIZE: usize = 2;

    pub const fn new(active_keyboard_model: u8, active_machine_model: u8) -> Self {
        Config { active_keyboard_model, active_machine_model }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; Config::SIZE] {
        [self.active_keyboard_model, self.active_machine_model]
    }
    /// Decodes the persisted binary struct.
    ///
    /// Returns `None` if the size doesn't match or if any of the models is not a single bit.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match *data {
            [kbd, machine] if kbd.is_power_of_two() && machine.is_power_of_two() => {
                Some(Config::new(kbd, machine))
            }
            _ => None
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyboard: {} ({:#04x}), machine: {:#04x}",
            keyboard::name(self.active_keyboard_model),
            self.active_keyboard_model,
            self.active_machine_model)
    }
}
