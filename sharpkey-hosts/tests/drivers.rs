/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The acquisition loops running against real-time drivers on their own threads.
use core::sync::atomic::{AtomicU32, Ordering};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sharpkey_core::engine::{HostTarget, KeyMapping, KeyMapPersistence};
use sharpkey_core::scancode::{ps2key, KeyFlags, ScanCode};
use sharpkey_core::source::NoDelay;
use sharpkey_core::status::PatternLog;
use sharpkey_core::store::MemoryStore;
use sharpkey_hosts::mz::{self, matrix::{output_word, IDLE_WORD}, MatrixDriver, MatrixPort, MzKeyboard, MzShared};
use sharpkey_hosts::pc98::{Pc9801, Pc98Keyboard, Pc98Shared, SerialChannel, SerialDriver};

const DEADLINE: Duration = Duration::from_secs(5);

fn wait_until<F: FnMut() -> bool>(mut cond: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        if cond() {
            return true
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// A host continuously scanning row 4.
struct RowScanner {
    last: Arc<AtomicU32>,
    strobe: bool,
}

impl MatrixPort for RowScanner {
    fn strobe(&mut self) -> bool {
        self.strobe = !self.strobe;
        self.strobe
    }
    fn row_address(&mut self) -> u8 {
        4
    }
    fn row_data_required(&mut self) -> bool {
        true
    }
    fn write_data(&mut self, word: u32) {
        self.last.store(word, Ordering::SeqCst);
    }
}

#[test]
fn mz_keyboard_with_driver() {
    let shared = Arc::new(MzShared::default());
    let mut kbd = MzKeyboard::new(VecDeque::new(), MemoryStore::default(), PatternLog::default(),
                                  NoDelay::default(), Arc::clone(&shared));
    let last = Arc::new(AtomicU32::new(0xFFFF_FFFF));
    let driver = {
        let shared = Arc::clone(&shared);
        let port = RowScanner { last: Arc::clone(&last), strobe: false };
        thread::spawn(move || {
            let mut driver = MatrixDriver::new(port, || {}, shared);
            driver.run();
            driver.responses()
        })
    };
    // nothing pressed yet, so the configuration is persisted while the driver yields
    assert!(kbd.engine().state().config_dirty);
    assert!(!kbd.poll(None));
    assert!(!kbd.engine().state().config_dirty);
    assert_eq!(kbd.store().commits, 1);

    kbd.process_scan_code(ScanCode::make(ps2key::A, KeyFlags::empty()));
    assert!(wait_until(|| last.load(Ordering::SeqCst) == output_word(0xFD)));
    kbd.process_scan_code(ScanCode::release(ps2key::A, KeyFlags::empty()));
    assert!(wait_until(|| last.load(Ordering::SeqCst) == IDLE_WORD));

    let cs = KeyFlags::CTRL|KeyFlags::SHIFT;
    kbd.process_scan_code(ScanCode::make(ps2key::ESC, cs));
    kbd.process_scan_code(ScanCode::make(ps2key::N9, cs));
    kbd.poll(None);
    assert_eq!(kbd.store().commits, 2);
    assert_eq!(shared.machine_model(), mz::machine::MZ_2800);

    kbd.save_keymap().unwrap();
    assert!(kbd.store().tables.contains_key(mz::Mz2528::KEYMAP_FILE));

    shared.handshake.shutdown();
    assert!(driver.join().unwrap() > 0);
    assert_eq!(last.load(Ordering::SeqCst), IDLE_WORD);
}

/// A host collecting the received bytes.
#[derive(Clone, Default)]
struct SerialHost {
    received: Arc<Mutex<Vec<u8>>>,
    commands: Arc<Mutex<VecDeque<u8>>>,
}

impl SerialChannel for SerialHost {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.received.lock().unwrap().push(byte);
        Ok(())
    }
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.commands.lock().unwrap().pop_front())
    }
}

#[test]
fn pc98_keyboard_with_driver() {
    let shared = Arc::new(Pc98Shared::new());
    let mut kbd = Pc98Keyboard::new(VecDeque::new(), MemoryStore::default(), PatternLog::default(),
                                    Arc::clone(&shared));
    let host = SerialHost::default();
    host.commands.lock().unwrap().extend([0xFA, 0x9D, 0xFC].iter());
    let driver = {
        let shared = Arc::clone(&shared);
        let host = host.clone();
        thread::spawn(move || {
            let mut driver = SerialDriver::new(host, || {}, shared);
            driver.run().map(|_| driver.sent())
        })
    };
    kbd.process_scan_code(ScanCode::make(ps2key::L_SHIFT, KeyFlags::SHIFT));
    kbd.process_scan_code(ScanCode::make(ps2key::N2, KeyFlags::SHIFT));
    kbd.process_scan_code(ScanCode::release(ps2key::N2, KeyFlags::SHIFT));
    kbd.process_scan_code(ScanCode::release(ps2key::L_SHIFT, KeyFlags::empty()));
    kbd.process_scan_code(ScanCode::make(ps2key::APOS, KeyFlags::empty()));
    kbd.process_scan_code(ScanCode::release(ps2key::APOS, KeyFlags::empty()));
    let expected = [0x70, 0x02, 0x82, 0xF0, 0x70, 0x07, 0xF0, 0x87];
    assert!(wait_until(|| host.received.lock().unwrap().len() == expected.len()));
    assert_eq!(*host.received.lock().unwrap(), expected);
    // the keep-alive bytes are filtered out
    assert!(wait_until(|| host.commands.lock().unwrap().is_empty()));
    assert!(wait_until(|| !shared.rcv.is_empty()));
    assert_eq!(shared.rcv.try_pop(), Some(0x9D));

    // the default configuration is persisted with the driver running
    kbd.poll(None);
    assert!(!kbd.engine().state().config_dirty);
    assert_eq!(kbd.store().commits, 1);
    assert!(kbd.store().committed.contains_key(Pc9801::NAME));

    shared.handshake.shutdown();
    assert_eq!(driver.join().unwrap().unwrap(), expected.len() as u64);
}
