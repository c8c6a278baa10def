/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The built-in MZ-2500/MZ-2800 key map.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use sharpkey_core::keymap::{CtrlMask, KeyMapEntry, RecordAction, MACHINE_ALL, keyboard};
use sharpkey_core::scancode::ps2key;

use super::machine;
use super::matrix::MatrixTarget;

/// The action of an MZ key map row.
///
/// On a key press the `brk` targets are made inactive first, then the `make` targets active.
/// On a key release the `make` targets are made inactive first, then the `brk` targets active.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MzAction {
    pub make: [MatrixTarget; 3],
    pub brk: [MatrixTarget; 2],
}

const N: MatrixTarget = MatrixTarget::NONE;

impl MzAction {
    /// Does nothing, used to block a key combination with no equivalent.
    pub const NOP: MzAction = MzAction { make: [N, N, N], brk: [N, N] };

    pub const fn new(make: [MatrixTarget; 3], brk: [MatrixTarget; 2]) -> Self {
        MzAction { make, brk }
    }
    /// Activates a single key.
    pub const fn key(target: MatrixTarget) -> Self {
        MzAction { make: [target, N, N], brk: [N, N] }
    }
    /// Activates two keys.
    pub const fn keys(first: MatrixTarget, second: MatrixTarget) -> Self {
        MzAction { make: [first, second, N], brk: [N, N] }
    }
    /// Activates a single key while temporarily releasing `held`.
    pub const fn key_without(target: MatrixTarget, held: MatrixTarget) -> Self {
        MzAction { make: [target, N, N], brk: [held, N] }
    }
    /// Iterates over the used `make` targets.
    pub fn make_targets(&self) -> impl Iterator<Item=MatrixTarget> + '_ {
        self.make.iter().copied().filter(|t| !t.is_none())
    }
    /// Iterates over the used `brk` targets.
    pub fn break_targets(&self) -> impl Iterator<Item=MatrixTarget> + '_ {
        self.brk.iter().copied().filter(|t| !t.is_none())
    }
}

impl RecordAction for MzAction {
    const SIZE: usize = 10;

    fn write_record(&self, out: &mut [u8]) {
        for (target, pair) in self.make.iter().chain(self.brk.iter()).zip(out.chunks_exact_mut(2)) {
            pair[0] = target.row;
            pair[1] = target.bit;
        }
    }

    fn read_record(data: &[u8]) -> Option<Self> {
        let mut targets = [N; 5];
        for (target, pair) in targets.iter_mut().zip(data.chunks_exact(2)) {
            *target = MatrixTarget::new(pair[0], pair[1]);
            if !target.is_valid() {
                return None
            }
        }
        let [m0, m1, m2, b0, b1] = targets;
        Some(MzAction::new([m0, m1, m2], [b0, b1]))
    }
}

/// Key positions of the MZ-2500/MZ-2800 key matrix.
pub mod mzkey {
    use super::MatrixTarget as T;

    pub const F1:            T = T::new(0x00, 0x01);
    pub const F2:            T = T::new(0x00, 0x02);
    pub const F3:            T = T::new(0x00, 0x04);
    pub const F4:            T = T::new(0x00, 0x08);
    pub const F5:            T = T::new(0x00, 0x10);
    pub const F6:            T = T::new(0x00, 0x20);
    pub const F7:            T = T::new(0x00, 0x40);
    pub const F8:            T = T::new(0x00, 0x80);
    pub const F9:            T = T::new(0x01, 0x01);
    pub const F10:           T = T::new(0x01, 0x02);
    pub const KP_8:          T = T::new(0x01, 0x04);
    pub const KP_9:          T = T::new(0x01, 0x08);
    pub const KP_COMMA:      T = T::new(0x01, 0x10);
    pub const KP_DOT:        T = T::new(0x01, 0x20);
    pub const KP_PLUS:       T = T::new(0x01, 0x40);
    pub const KP_MINUS:      T = T::new(0x01, 0x80);
    pub const KP_0:          T = T::new(0x02, 0x01);
    pub const KP_1:          T = T::new(0x02, 0x02);
    pub const KP_2:          T = T::new(0x02, 0x04);
    pub const KP_3:          T = T::new(0x02, 0x08);
    pub const KP_4:          T = T::new(0x02, 0x10);
    pub const KP_5:          T = T::new(0x02, 0x20);
    pub const KP_6:          T = T::new(0x02, 0x40);
    pub const KP_7:          T = T::new(0x02, 0x80);
    pub const TAB:           T = T::new(0x03, 0x01);
    pub const SPACE:         T = T::new(0x03, 0x02);
    pub const CR:            T = T::new(0x03, 0x04);
    pub const UP:            T = T::new(0x03, 0x08);
    pub const DOWN:          T = T::new(0x03, 0x10);
    pub const LEFT:          T = T::new(0x03, 0x20);
    pub const RIGHT:         T = T::new(0x03, 0x40);
    pub const BREAK:         T = T::new(0x03, 0x80);
    pub const SLASH:         T = T::new(0x04, 0x01);
    pub const A:             T = T::new(0x04, 0x02);
    pub const B:             T = T::new(0x04, 0x04);
    pub const C:             T = T::new(0x04, 0x08);
    pub const D:             T = T::new(0x04, 0x10);
    pub const E:             T = T::new(0x04, 0x20);
    pub const F:             T = T::new(0x04, 0x40);
    pub const G:             T = T::new(0x04, 0x80);
    pub const H:             T = T::new(0x05, 0x01);
    pub const I:             T = T::new(0x05, 0x02);
    pub const J:             T = T::new(0x05, 0x04);
    pub const K:             T = T::new(0x05, 0x08);
    pub const L:             T = T::new(0x05, 0x10);
    pub const M:             T = T::new(0x05, 0x20);
    pub const N:             T = T::new(0x05, 0x40);
    pub const O:             T = T::new(0x05, 0x80);
    pub const P:             T = T::new(0x06, 0x01);
    pub const Q:             T = T::new(0x06, 0x02);
    pub const R:             T = T::new(0x06, 0x04);
    pub const S:             T = T::new(0x06, 0x08);
    pub const T_:            T = T::new(0x06, 0x10);
    pub const U:             T = T::new(0x06, 0x20);
    pub const V:             T = T::new(0x06, 0x40);
    pub const W:             T = T::new(0x06, 0x80);
    pub const X:             T = T::new(0x07, 0x01);
    pub const Y:             T = T::new(0x07, 0x02);
    pub const Z:             T = T::new(0x07, 0x04);
    pub const HAT:           T = T::new(0x07, 0x08);
    pub const YEN:           T = T::new(0x07, 0x10);
    pub const UNDERSCORE:    T = T::new(0x07, 0x20);
    pub const DOT:           T = T::new(0x07, 0x40);
    pub const COMMA:         T = T::new(0x07, 0x80);
    pub const N0:            T = T::new(0x08, 0x01);
    pub const N1:            T = T::new(0x08, 0x02);
    pub const N2:            T = T::new(0x08, 0x04);
    pub const N3:            T = T::new(0x08, 0x08);
    pub const N4:            T = T::new(0x08, 0x10);
    pub const N5:            T = T::new(0x08, 0x20);
    pub const N6:            T = T::new(0x08, 0x40);
    pub const N7:            T = T::new(0x08, 0x80);
    pub const N8:            T = T::new(0x09, 0x01);
    pub const N9:            T = T::new(0x09, 0x02);
    pub const COLON:         T = T::new(0x09, 0x04);
    pub const SEMICOLON:     T = T::new(0x09, 0x08);
    pub const MINUS:         T = T::new(0x09, 0x10);
    pub const AT:            T = T::new(0x09, 0x20);
    pub const OPEN_BRACKET:  T = T::new(0x09, 0x40);
    pub const CLOSE_BRACKET: T = T::new(0x09, 0x80);
    pub const KP_TIMES:      T = T::new(0x0A, 0x01);
    pub const KP_DIV:        T = T::new(0x0A, 0x02);
    pub const ESC:           T = T::new(0x0B, 0x01);
    pub const BS:            T = T::new(0x0B, 0x02);
    pub const INST:          T = T::new(0x0B, 0x04);
    pub const DEL:           T = T::new(0x0B, 0x08);
    pub const CLR:           T = T::new(0x0B, 0x10);
    pub const HELP:          T = T::new(0x0B, 0x20);
    pub const COPY:          T = T::new(0x0B, 0x40);
    pub const ARGO:          T = T::new(0x0B, 0x80);
    pub const KANA:          T = T::new(0x0C, 0x01);
    pub const GRAPH:         T = T::new(0x0C, 0x02);
    pub const LOCK:          T = T::new(0x0C, 0x04);
    pub const SHIFT:         T = T::new(0x0C, 0x08);
    pub const CTRL:          T = T::new(0x0C, 0x10);
    pub const LOGO:          T = T::new(0x0C, 0x20);
    pub const ROLL_UP:       T = T::new(0x0D, 0x01);
    pub const ROLL_DOWN:     T = T::new(0x0D, 0x02);
    pub const XFER:          T = T::new(0x0D, 0x04);
    pub const NFER:          T = T::new(0x0D, 0x08);
}

use mzkey as mz;

const NO:   CtrlMask = CtrlMask::empty();
const SH:   CtrlMask = CtrlMask::SHIFT;
const SHX:  CtrlMask = CtrlMask::SHIFT.union(CtrlMask::EXACT);
const STD:  u8 = keyboard::STANDARD;
const WEST: u8 = keyboard::WESTERN;
const JAP:  u8 = keyboard::JAPANESE;
const ALL:  u8 = MACHINE_ALL;
const M2800: u8 = machine::MZ_2800;

const fn row(code: u8, ctrl: CtrlMask, keyboards: u8, machines: u8, action: MzAction) -> KeyMapEntry<MzAction> {
    KeyMapEntry::new(code, ctrl, keyboards, machines, action)
}

const fn key(code: u8, target: MatrixTarget) -> KeyMapEntry<MzAction> {
    row(code, NO, STD, ALL, MzAction::key(target))
}

/// The index of the row mapping `Shift+1` to the exclamation mark.
pub const EXCLAMATION_ROW: usize = 0;

/// The built-in key map.
///
/// Rows for western keyboards substitute shifted symbols to their MZ key positions.
/// Rows for japanese keyboards follow the key positions, as the layouts match.
pub static KEYMAP: [KeyMapEntry<MzAction>; 130] = [
    // Exclamation
    row(ps2key::N1,       SHX, STD,  ALL, MzAction::key(mz::N1)),
    key(ps2key::N1,       mz::N1),
    key(ps2key::N2,       mz::N2),
    // £
    row(ps2key::N3,       SH,  WEST, ALL, MzAction::NOP),
    key(ps2key::N3,       mz::N3),
    key(ps2key::N4,       mz::N4),
    key(ps2key::N5,       mz::N5),
    // ^
    row(ps2key::N6,       SH,  WEST, ALL, MzAction::key_without(mz::HAT, mz::SHIFT)),
    key(ps2key::N6,       mz::N6),
    // &
    row(ps2key::N7,       SH,  WEST, ALL, MzAction::key(mz::N6)),
    key(ps2key::N7,       mz::N7),
    // *
    row(ps2key::N8,       SH,  WEST, ALL, MzAction::key(mz::COLON)),
    key(ps2key::N8,       mz::N8),
    // (
    row(ps2key::N9,       SH,  WEST, ALL, MzAction::key(mz::N8)),
    key(ps2key::N9,       mz::N9),
    // )
    row(ps2key::N0,       SH,  WEST, ALL, MzAction::key(mz::N9)),
    key(ps2key::N0,       mz::N0),
    // _
    row(ps2key::MINUS,    SH,  WEST, ALL, MzAction::key_without(mz::UNDERSCORE, mz::SHIFT)),
    key(ps2key::MINUS,    mz::MINUS),
    // + and =
    row(ps2key::EQUAL,    SH,  WEST, ALL, MzAction::key(mz::SEMICOLON)),
    row(ps2key::EQUAL,    NO,  WEST, ALL, MzAction::keys(mz::SHIFT, mz::MINUS)),
    row(ps2key::EQUAL,    NO,  JAP,  ALL, MzAction::key(mz::HAT)),
    // :
    row(ps2key::SEMI,     SH,  WEST, ALL, MzAction::key_without(mz::COLON, mz::SHIFT)),
    key(ps2key::SEMI,     mz::SEMICOLON),
    // @ and '
    row(ps2key::APOS,     SH,  WEST, ALL, MzAction::key_without(mz::AT, mz::SHIFT)),
    row(ps2key::APOS,     NO,  WEST, ALL, MzAction::keys(mz::SHIFT, mz::N7)),
    row(ps2key::APOS,     NO,  JAP,  ALL, MzAction::key(mz::COLON)),
    // ~ and #
    row(ps2key::BACK,     SH,  WEST, ALL, MzAction::key(mz::HAT)),
    row(ps2key::BACK,     NO,  WEST, ALL, MzAction::keys(mz::SHIFT, mz::N3)),
    row(ps2key::BACK,     NO,  JAP,  ALL, MzAction::key(mz::CLOSE_BRACKET)),
    // ¬ and `
    row(ps2key::SINGLE,   SH,  WEST, ALL, MzAction::NOP),
    row(ps2key::SINGLE,   NO,  WEST, ALL, MzAction::keys(mz::SHIFT, mz::AT)),
    row(ps2key::OPEN_SQ,  NO,  WEST, ALL, MzAction::key(mz::OPEN_BRACKET)),
    row(ps2key::OPEN_SQ,  NO,  JAP,  ALL, MzAction::key(mz::AT)),
    row(ps2key::CLOSE_SQ, NO,  WEST, ALL, MzAction::key(mz::CLOSE_BRACKET)),
    row(ps2key::CLOSE_SQ, NO,  JAP,  ALL, MzAction::key(mz::OPEN_BRACKET)),
    row(ps2key::EUROPE2,  NO,  WEST, ALL, MzAction::key(mz::YEN)),
    row(ps2key::INTL1,    NO,  JAP,  ALL, MzAction::key(mz::UNDERSCORE)),
    row(ps2key::INTL2,    NO,  JAP,  ALL, MzAction::key(mz::KANA)),
    row(ps2key::INTL3,    NO,  JAP,  ALL, MzAction::key(mz::YEN)),
    row(ps2key::INTL4,    NO,  JAP,  ALL, MzAction::key(mz::XFER)),
    row(ps2key::INTL5,    NO,  JAP,  ALL, MzAction::key(mz::NFER)),
    key(ps2key::COMMA,    mz::COMMA),
    key(ps2key::DOT,      mz::DOT),
    key(ps2key::DIV,      mz::SLASH),

    key(ps2key::A,        mz::A),
    key(ps2key::B,        mz::B),
    key(ps2key::C,        mz::C),
    key(ps2key::D,        mz::D),
    key(ps2key::E,        mz::E),
    key(ps2key::F,        mz::F),
    key(ps2key::G,        mz::G),
    key(ps2key::H,        mz::H),
    key(ps2key::I,        mz::I),
    key(ps2key::J,        mz::J),
    key(ps2key::K,        mz::K),
    key(ps2key::L,        mz::L),
    key(ps2key::M,        mz::M),
    key(ps2key::N,        mz::N),
    key(ps2key::O,        mz::O),
    key(ps2key::P,        mz::P),
    key(ps2key::Q,        mz::Q),
    key(ps2key::R,        mz::R),
    key(ps2key::S,        mz::S),
    key(ps2key::T,        mz::T_),
    key(ps2key::U,        mz::U),
    key(ps2key::V,        mz::V),
    key(ps2key::W,        mz::W),
    key(ps2key::X,        mz::X),
    key(ps2key::Y,        mz::Y),
    key(ps2key::Z,        mz::Z),

    key(ps2key::F1,       mz::F1),
    key(ps2key::F2,       mz::F2),
    key(ps2key::F3,       mz::F3),
    key(ps2key::F4,       mz::F4),
    key(ps2key::F5,       mz::F5),
    key(ps2key::F6,       mz::F6),
    key(ps2key::F7,       mz::F7),
    key(ps2key::F8,       mz::F8),
    key(ps2key::F9,       mz::F9),
    key(ps2key::F10,      mz::F10),
    row(ps2key::F11,      NO,  STD,  M2800, MzAction::key(mz::XFER)),
    row(ps2key::F12,      NO,  STD,  M2800, MzAction::key(mz::NFER)),

    key(ps2key::KP_0,     mz::KP_0),
    key(ps2key::KP_1,     mz::KP_1),
    key(ps2key::KP_2,     mz::KP_2),
    key(ps2key::KP_3,     mz::KP_3),
    key(ps2key::KP_4,     mz::KP_4),
    key(ps2key::KP_5,     mz::KP_5),
    key(ps2key::KP_6,     mz::KP_6),
    key(ps2key::KP_7,     mz::KP_7),
    key(ps2key::KP_8,     mz::KP_8),
    key(ps2key::KP_9,     mz::KP_9),
    key(ps2key::KP_DOT,   mz::KP_DOT),
    key(ps2key::KP_COMMA, mz::KP_COMMA),
    key(ps2key::KP_PLUS,  mz::KP_PLUS),
    key(ps2key::KP_MINUS, mz::KP_MINUS),
    key(ps2key::KP_TIMES, mz::KP_TIMES),
    key(ps2key::KP_DIV,   mz::KP_DIV),
    key(ps2key::KP_ENTER, mz::CR),

    key(ps2key::ESC,      mz::ESC),
    key(ps2key::BS,       mz::BS),
    key(ps2key::TAB,      mz::TAB),
    key(ps2key::ENTER,    mz::CR),
    key(ps2key::SPACE,    mz::SPACE),
    key(ps2key::UP_ARROW, mz::UP),
    key(ps2key::DN_ARROW, mz::DOWN),
    key(ps2key::L_ARROW,  mz::LEFT),
    key(ps2key::R_ARROW,  mz::RIGHT),
    key(ps2key::INSERT,   mz::INST),
    key(ps2key::DELETE,   mz::DEL),
    key(ps2key::HOME,     mz::CLR),
    key(ps2key::END,      mz::HELP),
    key(ps2key::PGUP,     mz::ROLL_UP),
    key(ps2key::PGDN,     mz::ROLL_DOWN),
    key(ps2key::PRTSCR,   mz::COPY),
    key(ps2key::SYSRQ,    mz::COPY),
    key(ps2key::MENU,     mz::ARGO),
    key(ps2key::BREAK,    mz::BREAK),
    // a synthetic SHIFT+BREAK
    row(ps2key::PAUSE,    NO,  STD,  ALL,   MzAction::keys(mz::SHIFT, mz::BREAK)),

    key(ps2key::L_SHIFT,  mz::SHIFT),
    key(ps2key::R_SHIFT,  mz::SHIFT),
    key(ps2key::L_CTRL,   mz::CTRL),
    key(ps2key::R_CTRL,   mz::CTRL),
    key(ps2key::CAPS,     mz::LOCK),
    key(ps2key::L_ALT,    mz::GRAPH),
    row(ps2key::R_ALT,    NO,  WEST, ALL,   MzAction::key(mz::KANA)),
    row(ps2key::R_ALT,    NO,  JAP,  ALL,   MzAction::key(mz::GRAPH)),
    row(ps2key::L_GUI,    NO,  STD,  M2800, MzAction::key(mz::LOGO)),
    row(ps2key::R_GUI,    NO,  STD,  M2800, MzAction::key(mz::LOGO)),
];

#[cfg(test)]
mod tests {
    use super::*;
    use sharpkey_core::keymap::KeyMap;

    #[test]
    fn builtin_keymap_is_valid() {
        let keymap = KeyMap::from_builtin(&KEYMAP);
        let issues = keymap.validate(machine::ALL_BITS);
        assert!(issues.is_empty(), "{:?}", issues);
        for entry in KEYMAP.iter() {
            for target in entry.action.make.iter().chain(entry.action.brk.iter()) {
                assert!(target.is_valid(), "{:?}", entry);
            }
        }
        assert_eq!(KEYMAP[EXCLAMATION_ROW].ps2_code, ps2key::N1);
        assert!(KEYMAP[EXCLAMATION_ROW].is_exact_only());
    }

    #[test]
    fn binary_keymap() {
        let keymap = KeyMap::from_builtin(&KEYMAP);
        let data = keymap.to_bytes();
        assert_eq!(data.len(), KEYMAP.len() * 14);
        // the ^ row
        assert_eq!(&data[7 * 14..8 * 14], &[ps2key::N6, 0x01, WEST, ALL,
                                            0x07, 0x08, 0xFF, 0, 0xFF, 0,
                                            0x0C, 0x08, 0xFF, 0]);
        assert_eq!(KeyMap::<MzAction>::from_bytes(&data).unwrap(), keymap);
        let mut bad = data;
        bad[4] = 0x0F;
        assert!(KeyMap::<MzAction>::from_bytes(&bad).is_err());
    }
}
