/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The built-in PC-9801 key map.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use arrayvec::ArrayVec;
use bitflags::bitflags;

use sharpkey_core::keymap::{CtrlMask, KeyMapEntry, RecordAction, MACHINE_ALL, keyboard};
use sharpkey_core::scancode::ps2key;

bitflags! {
    /// Modifier bracketing of a [Pc98Action] key press.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default, Debug, PartialEq, Eq, Hash, Clone, Copy)]
    pub struct PcCtrl: u8 {
        /// Press SHIFT before the key and release it after.
        const SHIFT_PRESS   = 0b0000_0001;
        /// Release SHIFT before the key and press it again after.
        const SHIFT_RELEASE = 0b0000_0010;
    }
}

sharpkey_core::byte_flags!(PcCtrl);

/// The action of a PC-9801 key map row.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pc98Action {
    pub pc_ctrl: PcCtrl,
    /// A 7-bit PC-9801 key code.
    pub pc_key: u8,
}

/// The release flag of a PC-9801 key code.
pub const BREAK_FLAG: u8 = 0x80;

impl Pc98Action {
    pub const fn new(pc_ctrl: PcCtrl, pc_key: u8) -> Self {
        Pc98Action { pc_ctrl, pc_key }
    }

    pub const fn key(pc_key: u8) -> Self {
        Pc98Action { pc_ctrl: PcCtrl::empty(), pc_key }
    }
    /// Returns the transmit queue words of a key press.
    ///
    /// A bracketed key press queues the SHIFT change, the key and the SHIFT restore as
    /// separate words, so a `0x00` key code survives the framing.
    pub fn make_words(&self) -> ArrayVec<u32, 3> {
        let key = u32::from(self.pc_key);
        let shift = u32::from(pckey::SHIFT);
        let shift_up = u32::from(pckey::SHIFT|BREAK_FLAG);
        let mut words = ArrayVec::new();
        if self.pc_ctrl.contains(PcCtrl::SHIFT_PRESS) {
            words.extend([shift, key, shift_up].iter().copied());
        }
        else if self.pc_ctrl.contains(PcCtrl::SHIFT_RELEASE) {
            words.extend([shift_up, key, shift].iter().copied());
        }
        else {
            words.push(key);
        }
        words
    }
    /// Returns the transmit queue word of a key release.
    pub fn break_word(&self) -> u32 {
        u32::from(self.pc_key | BREAK_FLAG)
    }
}

impl RecordAction for Pc98Action {
    const SIZE: usize = 2;

    fn write_record(&self, out: &mut [u8]) {
        out[0] = self.pc_ctrl.bits();
        out[1] = self.pc_key;
    }

    fn read_record(data: &[u8]) -> Option<Self> {
        let pc_ctrl = PcCtrl::from_bits(data[0])?;
        if pc_ctrl.is_all() || data[1] & BREAK_FLAG != 0 {
            return None
        }
        Some(Pc98Action::new(pc_ctrl, data[1]))
    }
}

/// PC-9801 key codes.
pub mod pckey {
    pub const ESC:       u8 = 0x00;
    pub const N1:        u8 = 0x01;
    pub const N2:        u8 = 0x02;
    pub const N3:        u8 = 0x03;
    pub const N4:        u8 = 0x04;
    pub const N5:        u8 = 0x05;
    pub const N6:        u8 = 0x06;
    pub const N7:        u8 = 0x07;
    pub const N8:        u8 = 0x08;
    pub const N9:        u8 = 0x09;
    pub const N0:        u8 = 0x0A;
    pub const MINUS:     u8 = 0x0B;
    pub const HAT:       u8 = 0x0C;
    pub const YEN:       u8 = 0x0D;
    pub const BS:        u8 = 0x0E;
    pub const TAB:       u8 = 0x0F;
    pub const Q:         u8 = 0x10;
    pub const W:         u8 = 0x11;
    pub const E:         u8 = 0x12;
    pub const R:         u8 = 0x13;
    pub const T:         u8 = 0x14;
    pub const Y:         u8 = 0x15;
    pub const U:         u8 = 0x16;
    pub const I:         u8 = 0x17;
    pub const O:         u8 = 0x18;
    pub const P:         u8 = 0x19;
    pub const AT:        u8 = 0x1A;
    pub const OPEN_SQ:   u8 = 0x1B;
    pub const RET:       u8 = 0x1C;
    pub const A:         u8 = 0x1D;
    pub const S:         u8 = 0x1E;
    pub const D:         u8 = 0x1F;
    pub const F:         u8 = 0x20;
    pub const G:         u8 = 0x21;
    pub const H:         u8 = 0x22;
    pub const J:         u8 = 0x23;
    pub const K:         u8 = 0x24;
    pub const L:         u8 = 0x25;
    pub const SEMI:      u8 = 0x26;
    pub const COLON:     u8 = 0x27;
    pub const CLOSE_SQ:  u8 = 0x28;
    pub const Z:         u8 = 0x29;
    pub const X:         u8 = 0x2A;
    pub const C:         u8 = 0x2B;
    pub const V:         u8 = 0x2C;
    pub const B:         u8 = 0x2D;
    pub const N:         u8 = 0x2E;
    pub const M:         u8 = 0x2F;
    pub const COMMA:     u8 = 0x30;
    pub const DOT:       u8 = 0x31;
    pub const DIV:       u8 = 0x32;
    pub const UNDERSCORE: u8 = 0x33;
    pub const SPACE:     u8 = 0x34;
    pub const XFER:      u8 = 0x35;
    pub const ROLLUP:    u8 = 0x36;
    pub const ROLLDOWN:  u8 = 0x37;
    pub const INS:       u8 = 0x38;
    pub const DEL:       u8 = 0x39;
    pub const UP:        u8 = 0x3A;
    pub const LEFT:      u8 = 0x3B;
    pub const RIGHT:     u8 = 0x3C;
    pub const DOWN:      u8 = 0x3D;
    pub const HOME:      u8 = 0x3E;
    pub const HELP:      u8 = 0x3F;
    pub const KP_MINUS:  u8 = 0x40;
    pub const KP_DIV:    u8 = 0x41;
    pub const KP_7:      u8 = 0x42;
    pub const KP_8:      u8 = 0x43;
    pub const KP_9:      u8 = 0x44;
    pub const KP_TIMES:  u8 = 0x45;
    pub const KP_4:      u8 = 0x46;
    pub const KP_5:      u8 = 0x47;
    pub const KP_6:      u8 = 0x48;
    pub const KP_PLUS:   u8 = 0x49;
    pub const KP_1:      u8 = 0x4A;
    pub const KP_2:      u8 = 0x4B;
    pub const KP_3:      u8 = 0x4C;
    pub const KP_EQUAL:  u8 = 0x4D;
    pub const KP_0:      u8 = 0x4E;
    pub const KP_COMMA:  u8 = 0x4F;
    pub const KP_DOT:    u8 = 0x50;
    pub const NFER:      u8 = 0x51;
    pub const VF1:       u8 = 0x52;
    pub const VF2:       u8 = 0x53;
    pub const VF3:       u8 = 0x54;
    pub const VF4:       u8 = 0x55;
    pub const VF5:       u8 = 0x56;
    pub const STOP:      u8 = 0x60;
    pub const COPY:      u8 = 0x61;
    pub const F1:        u8 = 0x62;
    pub const F2:        u8 = 0x63;
    pub const F3:        u8 = 0x64;
    pub const F4:        u8 = 0x65;
    pub const F5:        u8 = 0x66;
    pub const F6:        u8 = 0x67;
    pub const F7:        u8 = 0x68;
    pub const F8:        u8 = 0x69;
    pub const F9:        u8 = 0x6A;
    pub const F10:       u8 = 0x6B;
    pub const SHIFT:     u8 = 0x70;
    pub const CAPS:      u8 = 0x71;
    pub const KANA:      u8 = 0x72;
    pub const GRPH:      u8 = 0x73;
    pub const CTRL:      u8 = 0x74;
}

use pckey as pc;

const NO:   CtrlMask = CtrlMask::empty();
const SH:   CtrlMask = CtrlMask::SHIFT;
const STD:  u8 = keyboard::STANDARD;
const WEST: u8 = keyboard::WESTERN;
const JAP:  u8 = keyboard::JAPANESE;
const ALL:  u8 = MACHINE_ALL;

const PRESS:   PcCtrl = PcCtrl::SHIFT_PRESS;
const RELEASE: PcCtrl = PcCtrl::SHIFT_RELEASE;

const fn row(code: u8, ctrl: CtrlMask, keyboards: u8, action: Pc98Action) -> KeyMapEntry<Pc98Action> {
    KeyMapEntry::new(code, ctrl, keyboards, ALL, action)
}

const fn key(code: u8, pc_key: u8) -> KeyMapEntry<Pc98Action> {
    row(code, NO, STD, Pc98Action::key(pc_key))
}

const fn shifted(code: u8, pc_ctrl: PcCtrl, pc_key: u8) -> KeyMapEntry<Pc98Action> {
    row(code, SH, WEST, Pc98Action::new(pc_ctrl, pc_key))
}

/// The built-in key map.
///
/// The PC-9801 layout is JIS, so western keyboards have their shifted symbols moved to the
/// matching PC-9801 keys, with SHIFT bracketing where the shift state differs.
pub static KEYMAP: [KeyMapEntry<Pc98Action>; 126] = [
    key(ps2key::N1,       pc::N1),
    key(ps2key::N2,       pc::N2),
    key(ps2key::N3,       pc::N3),
    key(ps2key::N4,       pc::N4),
    key(ps2key::N5,       pc::N5),
    // ^
    shifted(ps2key::N6,   RELEASE, pc::HAT),
    key(ps2key::N6,       pc::N6),
    // &
    shifted(ps2key::N7,   PcCtrl::empty(), pc::N6),
    key(ps2key::N7,       pc::N7),
    // *
    shifted(ps2key::N8,   PcCtrl::empty(), pc::COLON),
    key(ps2key::N8,       pc::N8),
    // (
    shifted(ps2key::N9,   PcCtrl::empty(), pc::N8),
    key(ps2key::N9,       pc::N9),
    // )
    shifted(ps2key::N0,   PcCtrl::empty(), pc::N9),
    key(ps2key::N0,       pc::N0),
    // _
    shifted(ps2key::MINUS, PcCtrl::empty(), pc::UNDERSCORE),
    key(ps2key::MINUS,    pc::MINUS),
    // + and =
    shifted(ps2key::EQUAL, PcCtrl::empty(), pc::SEMI),
    row(ps2key::EQUAL,    NO,  WEST, Pc98Action::new(PRESS, pc::MINUS)),
    row(ps2key::EQUAL,    NO,  JAP,  Pc98Action::key(pc::HAT)),
    // :
    shifted(ps2key::SEMI, RELEASE, pc::COLON),
    key(ps2key::SEMI,     pc::SEMI),
    // @ and '
    shifted(ps2key::APOS, RELEASE, pc::AT),
    row(ps2key::APOS,     NO,  WEST, Pc98Action::new(PRESS, pc::N7)),
    row(ps2key::APOS,     NO,  JAP,  Pc98Action::key(pc::COLON)),
    // ~ and #
    shifted(ps2key::BACK, PcCtrl::empty(), pc::HAT),
    row(ps2key::BACK,     NO,  WEST, Pc98Action::new(PRESS, pc::N3)),
    row(ps2key::BACK,     NO,  JAP,  Pc98Action::key(pc::CLOSE_SQ)),
    // `
    row(ps2key::SINGLE,   NO,  WEST, Pc98Action::new(PRESS, pc::AT)),
    row(ps2key::OPEN_SQ,  NO,  WEST, Pc98Action::key(pc::OPEN_SQ)),
    row(ps2key::OPEN_SQ,  NO,  JAP,  Pc98Action::key(pc::AT)),
    row(ps2key::CLOSE_SQ, NO,  WEST, Pc98Action::key(pc::CLOSE_SQ)),
    row(ps2key::CLOSE_SQ, NO,  JAP,  Pc98Action::key(pc::OPEN_SQ)),
    row(ps2key::EUROPE2,  NO,  WEST, Pc98Action::key(pc::YEN)),
    row(ps2key::INTL1,    NO,  JAP,  Pc98Action::key(pc::UNDERSCORE)),
    row(ps2key::INTL2,    NO,  JAP,  Pc98Action::key(pc::KANA)),
    row(ps2key::INTL3,    NO,  JAP,  Pc98Action::key(pc::YEN)),
    row(ps2key::INTL4,    NO,  JAP,  Pc98Action::key(pc::XFER)),
    row(ps2key::INTL5,    NO,  JAP,  Pc98Action::key(pc::NFER)),
    key(ps2key::COMMA,    pc::COMMA),
    key(ps2key::DOT,      pc::DOT),
    key(ps2key::DIV,      pc::DIV),

    key(ps2key::A,        pc::A),
    key(ps2key::B,        pc::B),
    key(ps2key::C,        pc::C),
    key(ps2key::D,        pc::D),
    key(ps2key::E,        pc::E),
    key(ps2key::F,        pc::F),
    key(ps2key::G,        pc::G),
    key(ps2key::H,        pc::H),
    key(ps2key::I,        pc::I),
    key(ps2key::J,        pc::J),
    key(ps2key::K,        pc::K),
    key(ps2key::L,        pc::L),
    key(ps2key::M,        pc::M),
    key(ps2key::N,        pc::N),
    key(ps2key::O,        pc::O),
    key(ps2key::P,        pc::P),
    key(ps2key::Q,        pc::Q),
    key(ps2key::R,        pc::R),
    key(ps2key::S,        pc::S),
    key(ps2key::T,        pc::T),
    key(ps2key::U,        pc::U),
    key(ps2key::V,        pc::V),
    key(ps2key::W,        pc::W),
    key(ps2key::X,        pc::X),
    key(ps2key::Y,        pc::Y),
    key(ps2key::Z,        pc::Z),

    key(ps2key::F1,       pc::F1),
    key(ps2key::F2,       pc::F2),
    key(ps2key::F3,       pc::F3),
    key(ps2key::F4,       pc::F4),
    key(ps2key::F5,       pc::F5),
    key(ps2key::F6,       pc::F6),
    key(ps2key::F7,       pc::F7),
    key(ps2key::F8,       pc::F8),
    key(ps2key::F9,       pc::F9),
    key(ps2key::F10,      pc::F10),
    key(ps2key::F11,      pc::VF1),
    key(ps2key::F12,      pc::VF2),
    key(ps2key::F13,      pc::VF3),
    key(ps2key::F14,      pc::VF4),
    key(ps2key::F15,      pc::VF5),

    key(ps2key::KP_0,     pc::KP_0),
    key(ps2key::KP_1,     pc::KP_1),
    key(ps2key::KP_2,     pc::KP_2),
    key(ps2key::KP_3,     pc::KP_3),
    key(ps2key::KP_4,     pc::KP_4),
    key(ps2key::KP_5,     pc::KP_5),
    key(ps2key::KP_6,     pc::KP_6),
    key(ps2key::KP_7,     pc::KP_7),
    key(ps2key::KP_8,     pc::KP_8),
    key(ps2key::KP_9,     pc::KP_9),
    key(ps2key::KP_DOT,   pc::KP_DOT),
    key(ps2key::KP_COMMA, pc::KP_COMMA),
    key(ps2key::KP_EQUAL, pc::KP_EQUAL),
    key(ps2key::KP_PLUS,  pc::KP_PLUS),
    key(ps2key::KP_MINUS, pc::KP_MINUS),
    key(ps2key::KP_TIMES, pc::KP_TIMES),
    key(ps2key::KP_DIV,   pc::KP_DIV),
    key(ps2key::KP_ENTER, pc::RET),

    key(ps2key::ESC,      pc::ESC),
    key(ps2key::BS,       pc::BS),
    key(ps2key::TAB,      pc::TAB),
    key(ps2key::ENTER,    pc::RET),
    key(ps2key::SPACE,    pc::SPACE),
    key(ps2key::UP_ARROW, pc::UP),
    key(ps2key::DN_ARROW, pc::DOWN),
    key(ps2key::L_ARROW,  pc::LEFT),
    key(ps2key::R_ARROW,  pc::RIGHT),
    key(ps2key::INSERT,   pc::INS),
    key(ps2key::DELETE,   pc::DEL),
    key(ps2key::HOME,     pc::HOME),
    key(ps2key::END,      pc::HELP),
    key(ps2key::PGUP,     pc::ROLLDOWN),
    key(ps2key::PGDN,     pc::ROLLUP),
    key(ps2key::PRTSCR,   pc::COPY),
    key(ps2key::PAUSE,    pc::STOP),

    key(ps2key::L_SHIFT,  pc::SHIFT),
    key(ps2key::R_SHIFT,  pc::SHIFT),
    key(ps2key::L_CTRL,   pc::CTRL),
    key(ps2key::R_CTRL,   pc::CTRL),
    key(ps2key::CAPS,     pc::CAPS),
    key(ps2key::L_ALT,    pc::GRPH),
    row(ps2key::R_ALT,    NO,  WEST, Pc98Action::key(pc::KANA)),
    row(ps2key::R_ALT,    NO,  JAP,  Pc98Action::key(pc::GRPH)),
];
