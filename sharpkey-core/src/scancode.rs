/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Scan codes delivered by the keyboard acquisition layer.
//!
//! A scan code is a 16-bit value. The lower 8 bits identify a key (see [ps2key]), the upper
//! 8 bits carry the event and modifier flags ([KeyFlags]) as sampled at the time of the event.
//!
//! ```text
//!  b15   b14   b13  b12  b11  b10    b9   b8       b7 .. b0
//! BREAK SHIFT CTRL CAPS ALT  ALTGR  GUI  FUNCTION  key id
//! ```
use core::fmt;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use bitflags::bitflags;

use crate::{byte_flags, flag_groups};

bitflags! {
    /// Event and modifier flags of a [ScanCode].
    /// * Bit = 1 a modifier is being held down or the event is a key release.
    /// * Bit = 0 otherwise.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
    pub struct KeyFlags: u8 {
        const FUNCTION = 0b0000_0001;
        const GUI      = 0b0000_0010;
        const ALTGR    = 0b0000_0100;
        const ALT      = 0b0000_1000;
        const CAPS     = 0b0001_0000;
        const CTRL     = 0b0010_0000;
        const SHIFT    = 0b0100_0000;
        const BREAK    = 0b1000_0000;
    }
}
byte_flags!(KeyFlags);
flag_groups!(KeyFlags {
    /// All the modifier flags, excluding `BREAK`.
    pub const MODIFIERS = FUNCTION|GUI|ALTGR|ALT|CAPS|CTRL|SHIFT;
});

/// A single key event as delivered by the acquisition layer. Immutable once read.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(from = "u16", into = "u16"))]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct ScanCode {
    /// The key identifier, one of the [ps2key] constants.
    pub code: u8,
    /// Event and modifier flags.
    pub flags: KeyFlags,
}

impl ScanCode {
    /// Creates a key press (make) event of a key `code` with `modifiers`.
    ///
    /// The `BREAK` flag is removed from `modifiers`.
    #[inline]
    pub const fn make(code: u8, modifiers: KeyFlags) -> Self {
        let flags = KeyFlags::from_bits_retain(modifiers.bits() & KeyFlags::MODIFIERS.bits());
        ScanCode { code, flags }
    }
    /// Creates a key release (break) event of a key `code` with `modifiers`.
    #[inline]
    pub const fn release(code: u8, modifiers: KeyFlags) -> Self {
        let flags = KeyFlags::from_bits_retain(modifiers.bits() | KeyFlags::BREAK.bits());
        ScanCode { code, flags }
    }
    /// Returns `true` if this is a key release event.
    #[inline]
    pub fn is_break(self) -> bool {
        self.flags.contains(KeyFlags::BREAK)
    }
    /// Returns `true` if this is a key press event.
    #[inline]
    pub fn is_make(self) -> bool {
        !self.is_break()
    }
    /// Returns the modifier flags without the `BREAK` flag.
    #[inline]
    pub fn modifiers(self) -> KeyFlags {
        self.flags & KeyFlags::MODIFIERS
    }
    /// Returns the corresponding break event for a make event and vice versa.
    #[inline]
    pub fn toggled(self) -> Self {
        ScanCode { code: self.code, flags: self.flags ^ KeyFlags::BREAK }
    }
}

impl From<u16> for ScanCode {
    #[inline]
    fn from(raw: u16) -> Self {
        ScanCode { code: raw as u8, flags: KeyFlags::from_data((raw >> 8) as u8) }
    }
}

impl From<ScanCode> for u16 {
    #[inline]
    fn from(scan: ScanCode) -> u16 {
        (scan.flags.bits() as u16) << 8 | scan.code as u16
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_break() { "-" } else { "+" })?;
        for (flag, prefix) in MODIFIER_PREFIXES.iter() {
            if self.flags.contains(*flag) {
                write!(f, "{}-", prefix)?;
            }
        }
        match ps2key::name(self.code) {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#04x}", self.code)
        }
    }
}

/// Single letter prefixes used when formatting and parsing modifier flags.
pub const MODIFIER_PREFIXES: [(KeyFlags, char); 7] = [
    (KeyFlags::SHIFT,    'S'),
    (KeyFlags::CTRL,     'C'),
    (KeyFlags::ALT,      'A'),
    (KeyFlags::ALTGR,    'R'),
    (KeyFlags::GUI,      'G'),
    (KeyFlags::FUNCTION, 'F'),
    (KeyFlags::CAPS,     'L'),
];

/// Key identifiers as reported by the PS/2 acquisition layer.
///
/// Bluetooth HID usages are translated to the same identifiers before they reach the core.
pub mod ps2key {
    pub const NUM:      u8 = 0x01;
    pub const SCROLL:   u8 = 0x02;
    pub const CAPS:     u8 = 0x03;
    pub const PRTSCR:   u8 = 0x04;
    pub const PAUSE:    u8 = 0x05;
    pub const L_SHIFT:  u8 = 0x06;
    pub const R_SHIFT:  u8 = 0x07;
    pub const L_CTRL:   u8 = 0x08;
    pub const R_CTRL:   u8 = 0x09;
    pub const L_ALT:    u8 = 0x0A;
    pub const R_ALT:    u8 = 0x0B;
    pub const L_GUI:    u8 = 0x0C;
    pub const R_GUI:    u8 = 0x0D;
    pub const MENU:     u8 = 0x0E;
    pub const BREAK:    u8 = 0x0F;
    pub const SYSRQ:    u8 = 0x10;
    pub const HOME:     u8 = 0x11;
    pub const END:      u8 = 0x12;
    pub const PGUP:     u8 = 0x13;
    pub const PGDN:     u8 = 0x14;
    pub const L_ARROW:  u8 = 0x15;
    pub const R_ARROW:  u8 = 0x16;
    pub const UP_ARROW: u8 = 0x17;
    pub const DN_ARROW: u8 = 0x18;
    pub const INSERT:   u8 = 0x19;
    pub const DELETE:   u8 = 0x1A;
    pub const ESC:      u8 = 0x1B;
    pub const BS:       u8 = 0x1C;
    pub const TAB:      u8 = 0x1D;
    pub const ENTER:    u8 = 0x1E;
    pub const SPACE:    u8 = 0x1F;
    pub const KP_0:     u8 = 0x20;
    pub const KP_1:     u8 = 0x21;
    pub const KP_2:     u8 = 0x22;
    pub const KP_3:     u8 = 0x23;
    pub const KP_4:     u8 = 0x24;
    pub const KP_5:     u8 = 0x25;
    pub const KP_6:     u8 = 0x26;
    pub const KP_7:     u8 = 0x27;
    pub const KP_8:     u8 = 0x28;
    pub const KP_9:     u8 = 0x29;
    pub const KP_DOT:   u8 = 0x2A;
    pub const KP_ENTER: u8 = 0x2B;
    pub const KP_PLUS:  u8 = 0x2C;
    pub const KP_MINUS: u8 = 0x2D;
    pub const KP_TIMES: u8 = 0x2E;
    pub const KP_DIV:   u8 = 0x2F;
    pub const N0:       u8 = 0x30;
    pub const N1:       u8 = 0x31;
    pub const N2:       u8 = 0x32;
    pub const N3:       u8 = 0x33;
    pub const N4:       u8 = 0x34;
    pub const N5:       u8 = 0x35;
    pub const N6:       u8 = 0x36;
    pub const N7:       u8 = 0x37;
    pub const N8:       u8 = 0x38;
    pub const N9:       u8 = 0x39;
    pub const APOS:     u8 = 0x3A;
    pub const COMMA:    u8 = 0x3B;
    pub const MINUS:    u8 = 0x3C;
    pub const DOT:      u8 = 0x3D;
    pub const DIV:      u8 = 0x3E;
    pub const KP_EQUAL: u8 = 0x3F;
    pub const SINGLE:   u8 = 0x40;
    pub const A:        u8 = 0x41;
    pub const B:        u8 = 0x42;
    pub const C:        u8 = 0x43;
    pub const D:        u8 = 0x44;
    pub const E:        u8 = 0x45;
    pub const F:        u8 = 0x46;
    pub const G:        u8 = 0x47;
    pub const H:        u8 = 0x48;
    pub const I:        u8 = 0x49;
    pub const J:        u8 = 0x4A;
    pub const K:        u8 = 0x4B;
    pub const L:        u8 = 0x4C;
    pub const M:        u8 = 0x4D;
    pub const N:        u8 = 0x4E;
    pub const O:        u8 = 0x4F;
    pub const P:        u8 = 0x50;
    pub const Q:        u8 = 0x51;
    pub const R:        u8 = 0x52;
    pub const S:        u8 = 0x53;
    pub const T:        u8 = 0x54;
    pub const U:        u8 = 0x55;
    pub const V:        u8 = 0x56;
    pub const W:        u8 = 0x57;
    pub const X:        u8 = 0x58;
    pub const Y:        u8 = 0x59;
    pub const Z:        u8 = 0x5A;
    pub const SEMI:     u8 = 0x5B;
    pub const BACK:     u8 = 0x5C;
    pub const OPEN_SQ:  u8 = 0x5D;
    pub const CLOSE_SQ: u8 = 0x5E;
    pub const EQUAL:    u8 = 0x5F;
    pub const KP_COMMA: u8 = 0x60;
    pub const F1:       u8 = 0x61;
    pub const F2:       u8 = 0x62;
    pub const F3:       u8 = 0x63;
    pub const F4:       u8 = 0x64;
    pub const F5:       u8 = 0x65;
    pub const F6:       u8 = 0x66;
    pub const F7:       u8 = 0x67;
    pub const F8:       u8 = 0x68;
    pub const F9:       u8 = 0x69;
    pub const F10:      u8 = 0x6A;
    pub const F11:      u8 = 0x6B;
    pub const F12:      u8 = 0x6C;
    pub const F13:      u8 = 0x6D;
    pub const F14:      u8 = 0x6E;
    pub const F15:      u8 = 0x6F;
    /// The 102nd key of european keyboards (`\|` on UK layouts).
    pub const EUROPE2:  u8 = 0x8B;
    /// `ろ` (`\_`) on japanese keyboards.
    pub const INTL1:    u8 = 0x8C;
    /// Katakana/Hiragana on japanese keyboards.
    pub const INTL2:    u8 = 0x8D;
    /// `¥` on japanese keyboards.
    pub const INTL3:    u8 = 0x8E;
    /// Henkan (convert) on japanese keyboards.
    pub const INTL4:    u8 = 0x8F;
    /// Muhenkan (no convert) on japanese keyboards.
    pub const INTL5:    u8 = 0x90;

    static NAMES: &[(u8, &str)] = &[
        (NUM, "NUM"), (SCROLL, "SCROLL"), (CAPS, "CAPS"), (PRTSCR, "PRTSCR"), (PAUSE, "PAUSE"),
        (L_SHIFT, "L_SHIFT"), (R_SHIFT, "R_SHIFT"), (L_CTRL, "L_CTRL"), (R_CTRL, "R_CTRL"),
        (L_ALT, "L_ALT"), (R_ALT, "R_ALT"), (L_GUI, "L_GUI"), (R_GUI, "R_GUI"), (MENU, "MENU"),
        (BREAK, "BREAK"), (SYSRQ, "SYSRQ"), (HOME, "HOME"), (END, "END"), (PGUP, "PGUP"),
        (PGDN, "PGDN"), (L_ARROW, "LEFT"), (R_ARROW, "RIGHT"), (UP_ARROW, "UP"),
        (DN_ARROW, "DOWN"), (INSERT, "INSERT"), (DELETE, "DELETE"), (ESC, "ESC"), (BS, "BS"),
        (TAB, "TAB"), (ENTER, "ENTER"), (SPACE, "SPACE"),
        (KP_0, "KP_0"), (KP_1, "KP_1"), (KP_2, "KP_2"), (KP_3, "KP_3"), (KP_4, "KP_4"),
        (KP_5, "KP_5"), (KP_6, "KP_6"), (KP_7, "KP_7"), (KP_8, "KP_8"), (KP_9, "KP_9"),
        (KP_DOT, "KP_DOT"), (KP_ENTER, "KP_ENTER"), (KP_PLUS, "KP_PLUS"), (KP_MINUS, "KP_MINUS"),
        (KP_TIMES, "KP_TIMES"), (KP_DIV, "KP_DIV"),
        (N0, "0"), (N1, "1"), (N2, "2"), (N3, "3"), (N4, "4"), (N5, "5"), (N6, "6"), (N7, "7"),
        (N8, "8"), (N9, "9"), (APOS, "APOS"), (COMMA, "COMMA"), (MINUS, "MINUS"), (DOT, "DOT"),
        (DIV, "DIV"), (KP_EQUAL, "KP_EQUAL"), (SINGLE, "SINGLE"),
        (A, "A"), (B, "B"), (C, "C"), (D, "D"), (E, "E"), (F, "F"), (G, "G"), (H, "H"),
        (I, "I"), (J, "J"), (K, "K"), (L, "L"), (M, "M"), (N, "N"), (O, "O"), (P, "P"),
        (Q, "Q"), (R, "R"), (S, "S"), (T, "T"), (U, "U"), (V, "V"), (W, "W"), (X, "X"),
        (Y, "Y"), (Z, "Z"), (SEMI, "SEMI"), (BACK, "BACK"), (OPEN_SQ, "OPEN_SQ"),
        (CLOSE_SQ, "CLOSE_SQ"), (EQUAL, "EQUAL"), (KP_COMMA, "KP_COMMA"),
        (F1, "F1"), (F2, "F2"), (F3, "F3"), (F4, "F4"), (F5, "F5"), (F6, "F6"), (F7, "F7"),
        (F8, "F8"), (F9, "F9"), (F10, "F10"), (F11, "F11"), (F12, "F12"), (F13, "F13"),
        (F14, "F14"), (F15, "F15"),
        (EUROPE2, "EUROPE2"), (INTL1, "INTL1"), (INTL2, "INTL2"), (INTL3, "INTL3"),
        (INTL4, "INTL4"), (INTL5, "INTL5"),
    ];

    /// Returns the name of a key `code` if it's a known key.
    pub fn name(code: u8) -> Option<&'static str> {
        NAMES.iter().find(|&&(c, _)| c == code).map(|&(_, name)| name)
    }

    /// Returns the key code of a key `name`. The lookup is case insensitive.
    pub fn from_name(name: &str) -> Option<u8> {
        NAMES.iter().find(|&&(_, n)| n.eq_ignore_ascii_case(name)).map(|&(code, _)| code)
    }

    /// Returns the digit `0..=9` of a main keyboard digit key.
    #[inline]
    pub fn digit(code: u8) -> Option<u8> {
        match code {
            N0..=N9 => Some(code - N0),
            _ => None
        }
    }
}
