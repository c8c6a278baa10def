/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Scan code acquisition and timing capabilities consumed by the acquisition loop.
use core::time::Duration;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;

use crate::scancode::ScanCode;

/// A source of scan codes, e.g. a PS/2 decoder or a Bluetooth HID host.
pub trait ScanCodeSource {
    /// Reads the next scan code.
    ///
    /// With `timeout` being `None` polls without waiting, otherwise waits for a scan code up to
    /// the given `timeout`. Returns `None` if no scan code is available.
    fn read(&mut self, timeout: Option<Duration>) -> Option<ScanCode>;
}

/// Scan codes produced by an acquisition thread.
///
/// A disconnected channel behaves like a source that never produces anything.
impl ScanCodeSource for Receiver<ScanCode> {
    fn read(&mut self, timeout: Option<Duration>) -> Option<ScanCode> {
        match timeout {
            None => self.try_recv().ok(),
            Some(timeout) => match self.recv_timeout(timeout) {
                Ok(scan) => Some(scan),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(timeout);
                    None
                }
            }
        }
    }
}

/// A scripted source of scan codes; never waits.
impl ScanCodeSource for VecDeque<ScanCode> {
    #[inline]
    fn read(&mut self, _timeout: Option<Duration>) -> Option<ScanCode> {
        self.pop_front()
    }
}

impl<S: ScanCodeSource + ?Sized> ScanCodeSource for &mut S {
    #[inline]
    fn read(&mut self, timeout: Option<Duration>) -> Option<ScanCode> {
        (**self).read(timeout)
    }
}

/// Inserts settle delays for the benefit of the host sampling the keyboard state.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Delays by putting the current thread to sleep.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    #[inline]
    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// Doesn't delay at all, only sums up the requested delays.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct NoDelay {
    pub total: Duration,
}

impl Delay for NoDelay {
    #[inline]
    fn delay(&mut self, duration: Duration) {
        self.total += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use crate::scancode::{ps2key, KeyFlags};

    #[test]
    fn channel_source_works() {
        let (tx, mut rx) = channel();
        assert_eq!(rx.read(None), None);
        let scan = ScanCode::make(ps2key::A, KeyFlags::empty());
        tx.send(scan).unwrap();
        assert_eq!(rx.read(Some(Duration::from_millis(10))), Some(scan));
        assert_eq!(rx.read(Some(Duration::from_millis(1))), None);
        drop(tx);
        assert_eq!(rx.read(None), None);
        assert_eq!(rx.read(Some(Duration::from_millis(1))), None);
    }
}
