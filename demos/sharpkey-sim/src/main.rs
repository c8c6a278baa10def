use core::time::Duration;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc::{channel, Sender}};
use std::thread;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use clap::clap_app;

use sharpkey::{KeyMapping, KeyMapPersistence};
use sharpkey::mz::{matrix::ROWS, MatrixDriver, MzKeyboard, MzShared};
use sharpkey::pc98::{uart::BitBangSerial, Pc98Keyboard, Pc98Shared, SerialDriver};
use sharpkey::scancode::ScanCode;
use sharpkey::source::ThreadDelay;
use sharpkey_utils::indicator::LogIndicator;
use sharpkey_utils::script::{parse_script, ScriptStep};
use sharpkey_utils::store::DirStore;

mod host;

use host::*;

type Result<T> = core::result::Result<T, Box<dyn Error>>;

/// How long to wait after each scan code for the host to pick up the change.
const KEY_INTERVAL: Duration = Duration::from_millis(20);
/// How long to wait before shutting down, so a changed configuration gets persisted.
const SETTLE_TIME: Duration = Duration::from_millis(200);

const HELP: &str = r###"
Scripts are whitespace separated tokens, "#" starts a comment:

+KEY   presses a key, e.g. +L_SHIFT or +S-1 (with the Shift flag)
-KEY   releases a key, e.g. -S-1
KEY    presses and releases a key, e.g. A or C-S-ESC
@MS    waits MS milliseconds, same as wait:MS

Modifier flags: S-Shift C-Ctrl A-Alt R-AltGr G-GUI F-Function L-Caps Lock.
Option select: +C-S-ESC followed by a command key, e.g. +C-S-ESC +C-S-3
"###;

fn main() -> Result<()> {
    let matches = clap_app!(SharpkeySim =>
        (version: "0.1")
        (author: "Rafal Michalski")
        (about: "Types scan codes into a SHARPKEY keyboard interface attached to a virtual host")
        (after_help: HELP)
        (@arg target: -t --target +takes_value "Selects the host: mz (default) or pc98")
        (@arg store: -s --store +takes_value "The persistent store directory")
        (@arg keys: -k --keys +takes_value "Types the given script instead of a file")
        (@arg log: -l --log +takes_value "The log filter, e.g.: debug")
        (@arg realtime: -r --realtime "Clocks the PC-9801 serial line at 19200 baud")
        (@arg reset: --reset "Restores the factory defaults first")
        (@arg SCRIPT: "The script file, \"-\" reads the standard input")
    ).get_matches();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(matches.value_of("log").unwrap_or("info"))
    ).init();

    let source = match (matches.value_of("keys"), matches.value_of("SCRIPT")) {
        (Some(keys), _) => keys.to_string(),
        (None, Some("-"))|(None, None) => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            source
        }
        (None, Some(path)) => fs::read_to_string(path)?
    };
    let steps = parse_script(&source)?;
    info!("{} script steps", steps.len());

    let root = matches.value_of("store").map(PathBuf::from)
                      .unwrap_or_else(|| std::env::temp_dir().join("sharpkey-sim"));
    let store = DirStore::open(root)?;
    info!("store: {}", store.root().display());

    let reset = matches.is_present("reset");
    match matches.value_of("target").unwrap_or("mz") {
        "mz" => run_mz(store, &steps, reset),
        "pc98" => run_pc98(store, &steps, reset, matches.is_present("realtime")),
        target => {
            eprintln!(r#"Unknown target "{}".\nSelect one of: mz, pc98"#, target);
            Ok(())
        }
    }
}

/// Sends the script to the acquisition loop, calling `observe` after each scan code.
fn type_script<F: FnMut(ScanCode)>(tx: &Sender<ScanCode>, steps: &[ScriptStep], mut observe: F) -> Result<()> {
    for step in steps.iter() {
        match *step {
            ScriptStep::Scan(scan) => {
                tx.send(scan)?;
                thread::sleep(KEY_INTERVAL);
                observe(scan);
            }
            ScriptStep::Pause(delay) => thread::sleep(delay)
        }
    }
    Ok(())
}

fn run_mz(store: DirStore, steps: &[ScriptStep], reset: bool) -> Result<()> {
    let shared = Arc::new(MzShared::default());
    let (tx, rx) = channel();
    let mut keyboard = MzKeyboard::new(rx, store, LogIndicator::default(), ThreadDelay,
                                       Arc::clone(&shared));
    let frame: Frame = Arc::new(Mutex::new([0; ROWS]));
    let driver = {
        let shared = Arc::clone(&shared);
        let port = ScanningHost::new(Arc::clone(&frame));
        thread::Builder::new().name("mz-driver".into()).spawn(move || {
            let mut driver = MatrixDriver::new(port, || {}, shared);
            driver.run();
            driver.responses()
        })?
    };
    let acquisition = thread::Builder::new().name("acquisition".into()).spawn(move || {
        if reset {
            if let Err(err) = keyboard.factory_reset() {
                error!("factory reset failed: {}", err);
            }
        }
        keyboard.run();
        keyboard.config()
    })?;

    type_script(&tx, steps, |scan| {
        let words = match frame.lock() {
            Ok(frame) => *frame,
            Err(err) => *err.into_inner()
        };
        let active: Vec<String> = words.iter().enumerate()
            .filter(|(_, word)| **word != 0)
            .map(|(row, &word)| match row_bits(word) {
                Some(bits) => format!("{:X}:{:02X}", row, bits),
                None => format!("{:X}:?{:08x}", row, word)
            })
            .collect();
        println!("{:<16} {}", scan.to_string(), active.join(" "));
    })?;

    thread::sleep(SETTLE_TIME);
    shared.handshake.shutdown();
    let config = acquisition.join().map_err(|_| "acquisition thread panicked")?;
    let responses = driver.join().map_err(|_| "driver thread panicked")?;
    println!("{}, strobes served: {}", config, responses);
    Ok(())
}

fn run_pc98(store: DirStore, steps: &[ScriptStep], reset: bool, realtime: bool) -> Result<()> {
    let shared = Arc::new(Pc98Shared::new());
    let (tx, rx) = channel();
    let mut keyboard = Pc98Keyboard::new(rx, store, LogIndicator::default(), Arc::clone(&shared));
    let received = Arc::new(Mutex::new(Vec::new()));
    let driver = {
        let shared = Arc::clone(&shared);
        let serial = BitBangSerial::new(SerialLine::new(Arc::clone(&received), realtime));
        thread::Builder::new().name("pc98-driver".into()).spawn(move || {
            let mut driver = SerialDriver::new(serial, || {}, shared);
            driver.run().map(|_| driver.sent())
        })?
    };
    let acquisition = thread::Builder::new().name("acquisition".into()).spawn(move || {
        if reset {
            if let Err(err) = keyboard.factory_reset() {
                error!("factory reset failed: {}", err);
            }
        }
        keyboard.run();
        (keyboard.config(), keyboard.dropped())
    })?;

    type_script(&tx, steps, |scan| {
        let bytes: Vec<u8> = match received.lock() {
            Ok(mut received) => received.drain(..).collect(),
            Err(err) => err.into_inner().drain(..).collect()
        };
        let bytes: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
        println!("{:<16} {}", scan.to_string(), bytes.join(" "));
    })?;

    thread::sleep(SETTLE_TIME);
    shared.handshake.shutdown();
    let (config, dropped) = acquisition.join().map_err(|_| "acquisition thread panicked")?;
    let sent = driver.join().map_err(|_| "driver thread panicked")??;
    println!("{}, bytes sent: {}, words dropped: {}", config, sent, dropped);
    Ok(())
}
