/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The NEC PC-9801 serial keyboard interface.
//!
//! The keyboard talks to the host over an asynchronous serial line: 19200 baud, 8 data bits,
//! odd parity and 1 stop bit. A key press is reported with its key code, a key release with
//! the key code ORed with `0x80`. The host may only be sent data while it asserts `RDY`.
//!
//! [Pc98Keyboard] maps scan codes to words pushed to the transmit queue of [Pc98Shared].
//! The [SerialDriver] sends each word as up to 4 bytes, most significant byte first, and
//! forwards bytes received from the host to the receive queue.
use sharpkey_core::config::Config;
use sharpkey_core::engine::HostTarget;
use sharpkey_core::keymap::{self, KeyMapEntry};
use sharpkey_core::scancode::ps2key;
use sharpkey_core::sync::{BoundedQueue, SuspendHandshake};

mod driver;
mod keyboard;
mod keytable;
pub mod uart;

pub use driver::*;
pub use keyboard::*;
pub use keytable::*;

/// Emulated machine models.
pub mod machine {
    pub const PC9801: u8 = 0x01;
    /// All the defined machine model bits.
    pub const ALL_BITS: u8 = PC9801;

    pub fn name(model: u8) -> &'static str {
        match model {
            PC9801 => "PC-9801",
            _ => "Unknown"
        }
    }
}

/// The capacity of the transmit queue in words.
pub const XMIT_QUEUE_LEN: usize = 32;
/// The capacity of the receive queue in bytes.
pub const RCV_QUEUE_LEN: usize = 16;

/// The PC-9801 host target.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Pc9801;

impl HostTarget for Pc9801 {
    type Action = Pc98Action;
    const NAME: &'static str = "pc9801";
    const KEYMAP_FILE: &'static str = "pc9801.bin";
    const DEFAULT_CONFIG: Config = Config::new(keymap::keyboard::UK_WYSE_KB3926, machine::PC9801);
    const MACHINE_BITS: u8 = machine::ALL_BITS;

    fn builtin_keymap() -> &'static [KeyMapEntry<Pc98Action>] {
        &KEYMAP
    }
    /// `0`-`7` select the keyboard model. There's only one machine model.
    fn select_option(code: u8, config: &mut Config) -> bool {
        let prev = *config;
        if let Some(n @ 0..=7) = ps2key::digit(code) {
            config.active_keyboard_model = 1 << n;
        }
        *config != prev
    }
}

/// The state shared between [Pc98Keyboard] and [SerialDriver].
#[derive(Debug)]
pub struct Pc98Shared {
    /// Words to be sent to the host.
    pub xmit: BoundedQueue<u32>,
    /// Bytes received from the host.
    pub rcv: BoundedQueue<u8>,
    pub handshake: SuspendHandshake,
}

impl Pc98Shared {
    pub fn new() -> Self {
        Pc98Shared {
            xmit: BoundedQueue::new(XMIT_QUEUE_LEN),
            rcv: BoundedQueue::new(RCV_QUEUE_LEN),
            handshake: SuspendHandshake::new()
        }
    }
}

impl Default for Pc98Shared {
    fn default() -> Self {
        Pc98Shared::new()
    }
}
