/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Pressing and releasing a key, with its modifiers held, leaves the key matrix as it was.
use std::collections::VecDeque;
use std::sync::Arc;

use rand::prelude::*;
use rand::rngs::SmallRng;

use sharpkey_core::config::Config;
use sharpkey_core::engine::{HostTarget, KeyMapping};
use sharpkey_core::keymap::{CtrlMask, MACHINE_ALL};
use sharpkey_core::scancode::{ps2key, KeyFlags, ScanCode};
use sharpkey_core::source::NoDelay;
use sharpkey_core::status::NullIndicator;
use sharpkey_core::store::MemoryStore;
use sharpkey_hosts::mz::{self, matrix::output_word, Mz2528, MzKeyboard, MzShared, KEYMAP};

type Keyboard = MzKeyboard<VecDeque<ScanCode>, MemoryStore, NullIndicator, NoDelay>;

fn keyboard(config: Config) -> Keyboard {
    let mut store = MemoryStore::default();
    store.committed.insert(Mz2528::NAME.to_string(), config.to_bytes().to_vec());
    let shared = Arc::new(MzShared::new(config.active_machine_model));
    MzKeyboard::new(VecDeque::new(), store, NullIndicator, NoDelay::default(), shared)
}

/// Modifier keys pressed to produce the required flags.
fn modifier_keys(required: CtrlMask) -> Vec<(u8, KeyFlags)> {
    let mut keys = Vec::new();
    if required.contains(CtrlMask::SHIFT) {
        keys.push((ps2key::L_SHIFT, KeyFlags::SHIFT));
    }
    if required.contains(CtrlMask::CTRL) {
        keys.push((ps2key::L_CTRL, KeyFlags::CTRL));
    }
    if required.contains(CtrlMask::ALT) {
        keys.push((ps2key::L_ALT, KeyFlags::ALT));
    }
    keys
}

fn assert_mirrored(kbd: &Keyboard) {
    let words = kbd.shared().mirror.row_words();
    for (row, word) in kbd.matrix().rows().iter().zip(words.iter()) {
        assert_eq!(output_word(*row), *word);
    }
    assert_eq!(kbd.shared().mirror.strobe_all_word(), output_word(kbd.matrix().strobe_all()));
}

#[test]
fn make_then_break_restores_matrix() {
    let mut rng = SmallRng::seed_from_u64(0x5A5A_2500);
    for _ in 0..500 {
        let keyboard_model = 1u8 << rng.gen_range(0..8);
        let machine_model = 1u8 << rng.gen_range(0..4);
        let candidates: Vec<_> = KEYMAP.iter().filter(|entry| {
            entry.keyboards & keyboard_model != 0 &&
            (entry.machines == MACHINE_ALL || entry.machines & machine_model != 0) &&
            entry.ps2_code != ps2key::PAUSE
        }).collect();
        let entry = candidates.choose(&mut rng).unwrap();
        let mut kbd = keyboard(Config::new(keyboard_model, machine_model));

        let required = entry.required();
        let mut flags = KeyFlags::empty();
        if rng.gen_bool(0.3) {
            flags |= KeyFlags::CAPS;
        }
        let modifiers = modifier_keys(required);
        for &(code, flag) in modifiers.iter() {
            flags |= flag;
            kbd.process_scan_code(ScanCode::make(code, flags));
        }
        let before = *kbd.matrix().rows();
        assert_mirrored(&kbd);

        kbd.process_scan_code(ScanCode::make(entry.ps2_code, flags));
        assert_mirrored(&kbd);
        kbd.process_scan_code(ScanCode::release(entry.ps2_code, flags));
        assert_eq!(*kbd.matrix().rows(), before, "{:?} kbd: {:#04x} machine: {:#04x}",
                   entry, keyboard_model, machine_model);
        assert_mirrored(&kbd);

        for &(code, flag) in modifiers.iter().rev() {
            flags &= !flag;
            kbd.process_scan_code(ScanCode::release(code, flags));
        }
        assert!(kbd.matrix().is_idle());
        assert!(kbd.shared().handshake.yield_requested());
    }
}

fn matched_rows(kbd: &Keyboard, scan: ScanCode) -> Vec<usize> {
    let config = kbd.config();
    kbd.engine().keymap()
        .matches(scan, config.active_keyboard_model, config.active_machine_model)
        .map(|m| m.index)
        .collect()
}

#[test]
fn exclamation_row_applies_alone() {
    let mut kbd = keyboard(Mz2528::DEFAULT_CONFIG);
    let shifted = ScanCode::make(ps2key::N1, KeyFlags::SHIFT);
    assert_eq!(matched_rows(&kbd, shifted), [mz::EXCLAMATION_ROW]);
    kbd.process_scan_code(shifted);
    assert_eq!(kbd.matrix().row(0x08), !mz::mzkey::N1.bit);
    assert_eq!(kbd.matrix().rows().iter().filter(|&&row| row != 0xFF).count(), 1);
    // with Ctrl the exclamation row doesn't match exactly, so the generic row applies
    kbd.process_scan_code(ScanCode::release(ps2key::N1, KeyFlags::SHIFT));
    let ctrl_shifted = ScanCode::make(ps2key::N1, KeyFlags::SHIFT|KeyFlags::CTRL);
    let rows = matched_rows(&kbd, ctrl_shifted);
    assert!(!rows.is_empty());
    assert!(!rows.contains(&mz::EXCLAMATION_ROW), "{:?}", rows);
    kbd.process_scan_code(ctrl_shifted);
    assert_eq!(kbd.matrix().row(0x08), !mz::mzkey::N1.bit);
}

#[test]
fn letter_make_and_break() {
    let mut kbd = keyboard(Mz2528::DEFAULT_CONFIG);
    kbd.process_scan_code(ScanCode::make(ps2key::A, KeyFlags::empty()));
    assert_eq!(kbd.matrix().row(0x04), 0xFD);
    assert_eq!(kbd.shared().mirror.row_word(0x04), output_word(0xFD));
    assert!(!kbd.shared().handshake.yield_requested());
    kbd.process_scan_code(ScanCode::release(ps2key::A, KeyFlags::empty()));
    assert_eq!(kbd.matrix().row(0x04), 0xFF);
    assert_eq!(kbd.shared().mirror.row_word(0x04), mz::matrix::IDLE_WORD);
    assert!(kbd.shared().handshake.yield_requested());
}
