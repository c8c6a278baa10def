/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! End to end scenarios spanning the engine, both hosts and their drivers.
use core::fmt;
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::Arc;

use sharpkey::engine::{HostTarget, KeyMapping};
use sharpkey::keymap::{keyboard, CtrlMask, KeyMap, KeyMapEntry, MACHINE_ALL};
use sharpkey::mz::{self, Mz2528, MzKeyboard, MzShared};
use sharpkey::pc98::uart::{decode_frame, BitBangSerial, DataState, TxLine, FRAME_BITS};
use sharpkey::pc98::{self, Pc9801, Pc98Shared, SerialDriver};
use sharpkey::scancode::{ps2key, KeyFlags, ScanCode};
use sharpkey::source::NoDelay;
use sharpkey::status::NullIndicator;
use sharpkey::store::MemoryStore;

type Keyboard = MzKeyboard<VecDeque<ScanCode>, MemoryStore, NullIndicator, NoDelay>;

fn mz_keyboard() -> Keyboard {
    MzKeyboard::new(VecDeque::new(), MemoryStore::default(), NullIndicator, NoDelay::default(),
                    Arc::new(MzShared::default()))
}

const CS: KeyFlags = KeyFlags::CTRL.union(KeyFlags::SHIFT);

#[test]
fn option_select_consumes_digit() {
    let mut kbd = mz_keyboard();
    kbd.process_scan_code(ScanCode::make(ps2key::L_CTRL, KeyFlags::CTRL));
    kbd.process_scan_code(ScanCode::make(ps2key::L_SHIFT, CS));
    let before = *kbd.matrix().rows();
    kbd.process_scan_code(ScanCode::make(ps2key::ESC, CS));
    kbd.process_scan_code(ScanCode::make(ps2key::N3, CS));
    assert_eq!(kbd.config().active_keyboard_model, keyboard::NOT_ASSIGNED_4);
    assert_eq!(*kbd.matrix().rows(), before);
    assert!(!kbd.engine().state().option_select_armed);
}

#[test]
fn break_cancels_option_select() {
    let mut kbd = mz_keyboard();
    kbd.process_scan_code(ScanCode::make(ps2key::ESC, CS));
    assert!(kbd.engine().state().option_select_armed);
    kbd.process_scan_code(ScanCode::release(ps2key::ESC, CS));
    assert!(!kbd.engine().state().option_select_armed);
    assert!(kbd.matrix().is_idle());
    kbd.process_scan_code(ScanCode::make(ps2key::N3, KeyFlags::empty()));
    assert_eq!(kbd.config(), Mz2528::DEFAULT_CONFIG);
    assert_eq!(kbd.matrix().row(0x08), !mz::mzkey::N3.bit);
}

fn machine_bits(entry_machines: u8, defined: u8) -> impl Iterator<Item=u8> {
    let machines = if entry_machines == MACHINE_ALL { defined } else { entry_machines & defined };
    (0..8).map(|n| 1u8 << n).filter(move |bit| machines & bit != 0)
}

fn assert_exact_rows_stop<A: Copy + fmt::Debug>(table: &[KeyMapEntry<A>], defined_machines: u8) {
    let keymap = KeyMap::from_builtin(table);
    for (index, entry) in table.iter().enumerate().filter(|(_, e)| e.ctrl.contains(CtrlMask::EXACT)) {
        let scan = ScanCode::make(entry.ps2_code, entry.required().to_key_flags());
        for keyboard_model in (0..8).map(|n| 1u8 << n).filter(|bit| entry.keyboards & bit != 0) {
            for machine_model in machine_bits(entry.machines, defined_machines) {
                let matched: Vec<usize> = keymap.matches(scan, keyboard_model, machine_model)
                                                .map(|m| m.index).collect();
                if let Some(pos) = matched.iter().position(|&i| i == index) {
                    assert_eq!(pos, matched.len() - 1, "row {} {:?} fell through: {:?}",
                               index, entry, matched);
                }
            }
        }
    }
}

#[test]
fn exact_rows_never_fall_through() {
    assert_exact_rows_stop(Mz2528::builtin_keymap(), mz::machine::ALL_BITS);
    assert_exact_rows_stop(Pc9801::builtin_keymap(), pc98::machine::ALL_BITS);
}

#[test]
fn idle_matrix_allows_yield() {
    let mut kbd = mz_keyboard();
    assert!(kbd.matrix().is_idle());
    assert_eq!(kbd.matrix().strobe_all(), 0xFF);
    kbd.process_scan_code(ScanCode::make(ps2key::A, KeyFlags::empty()));
    assert_eq!(kbd.matrix().row(0x04) & 0x02, 0);
    assert_ne!(kbd.matrix().strobe_all(), 0xFF);
    assert!(!kbd.shared().handshake.yield_requested());
    kbd.process_scan_code(ScanCode::release(ps2key::A, KeyFlags::empty()));
    assert_eq!(kbd.matrix().row(0x04) & 0x02, 0x02);
    assert_eq!(kbd.matrix().strobe_all(), 0xFF);
    assert!(kbd.shared().handshake.yield_requested());
}

/// Collects frames clocked out on the `TxD` line.
#[derive(Default)]
struct FrameCollector {
    frame: Vec<DataState>,
    bytes: Vec<u8>,
    elapsed: Duration,
}

impl TxLine for FrameCollector {
    fn set_txd(&mut self, state: DataState) {
        if self.frame.is_empty() && state.is_mark() {
            return
        }
        self.frame.push(state);
        if self.frame.len() == FRAME_BITS {
            let mut bits = [DataState::Mark; FRAME_BITS];
            bits.copy_from_slice(&self.frame);
            self.bytes.push(decode_frame(&bits).unwrap());
            self.frame.clear();
        }
    }

    fn wait_bit(&mut self, period: Duration) {
        self.elapsed += period;
    }
}

#[test]
fn pc98_transmit_framing() {
    let shared = Arc::new(Pc98Shared::new());
    let serial = BitBangSerial::new(FrameCollector::default());
    let mut driver = SerialDriver::new(serial, || {}, Arc::clone(&shared));
    shared.xmit.try_push(0x0041).unwrap();
    for _ in 0..4 {
        driver.step().unwrap();
    }
    assert_eq!(driver.channel().line.bytes, [0x41]);
    shared.xmit.try_push(0x0080_0041).unwrap();
    for _ in 0..4 {
        driver.step().unwrap();
    }
    let line = &driver.channel().line;
    assert_eq!(line.bytes, [0x41, 0x80, 0x41]);
    assert!(line.frame.is_empty());
    assert_eq!(line.elapsed, pc98::uart::BIT_PERIOD * 3 * FRAME_BITS as u32);
}

#[test]
fn pc98_keyboard_frames_letter() {
    let shared = Arc::new(Pc98Shared::new());
    let mut kbd = pc98::Pc98Keyboard::new(VecDeque::new(), MemoryStore::default(), NullIndicator,
                                          Arc::clone(&shared));
    let mut driver = SerialDriver::new(BitBangSerial::new(FrameCollector::default()), || {},
                                       Arc::clone(&shared));
    kbd.process_scan_code(ScanCode::make(ps2key::A, KeyFlags::empty()));
    kbd.process_scan_code(ScanCode::release(ps2key::A, KeyFlags::empty()));
    for _ in 0..4 {
        driver.step().unwrap();
    }
    let a = pc98::pckey::A;
    assert_eq!(driver.channel().line.bytes, [a, a | 0x80]);
}
