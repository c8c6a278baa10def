/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
use std::sync::Arc;
use std::thread;

use sharpkey_core::sync::Liveness;

use super::machine;
use super::matrix::IDLE_WORD;
use super::MzShared;

/// The physical lines of the MZ keyboard port.
///
/// The real-time driver calls these methods while the host waits for data, so they must not
/// block.
pub trait MatrixPort {
    /// Returns `true` while the host asserts the strobe line.
    fn strobe(&mut self) -> bool;
    /// Reads the 4-bit row number.
    fn row_address(&mut self) -> u8;
    /// Returns `true` if the host requires the data of the addressed row, `false` if it
    /// requires all rows ANDed together.
    fn row_data_required(&mut self) -> bool;
    /// Drives the output port with a word created by [super::matrix::output_word].
    fn write_data(&mut self, word: u32);
    /// Busy waits for signals to settle.
    fn delay_ns(&mut self, _ns: u32) {}
}

impl<P: MatrixPort + ?Sized> MatrixPort for &mut P {
    #[inline]
    fn strobe(&mut self) -> bool {
        (**self).strobe()
    }
    #[inline]
    fn row_address(&mut self) -> u8 {
        (**self).row_address()
    }
    #[inline]
    fn row_data_required(&mut self) -> bool {
        (**self).row_data_required()
    }
    #[inline]
    fn write_data(&mut self, word: u32) {
        (**self).write_data(word)
    }
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        (**self).delay_ns(ns)
    }
}

/// Settle delays of a host strobe response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrobeTiming {
    /// Delay after the strobe is detected, before the row number is sampled.
    pub row_settle_ns: u32,
    /// Delay before the output port is driven.
    pub output_settle_ns: u32,
}

impl StrobeTiming {
    pub const MZ2500: StrobeTiming = StrobeTiming { row_settle_ns: 0, output_settle_ns: 0 };
    pub const MZ2800: StrobeTiming = StrobeTiming { row_settle_ns: 250, output_settle_ns: 100 };

    /// Returns the timing required by the `machine_model`.
    pub fn for_machine(machine_model: u8) -> Self {
        if machine_model == machine::MZ_2800 {
            StrobeTiming::MZ2800
        }
        else {
            StrobeTiming::MZ2500
        }
    }
}

/// The state of a [MatrixDriver].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Not yet started.
    Idle,
    /// Serving the host.
    Active,
    /// Outputs idle, execution context yielded.
    Yielding,
    /// Outputs idle, waiting for the persistent store access to complete.
    Suspended,
}

/// The number of strobe polls between liveness feeds while active.
const FEED_INTERVAL: u32 = 1 << 16;

/// The real-time MZ key matrix driver.
///
/// Serves host strobes from the [super::MirrorMatrix] only. Run it on an execution context
/// that no other work can preempt while it's active.
pub struct MatrixDriver<P, L> {
    port: P,
    liveness: L,
    shared: Arc<MzShared>,
    state: DriverState,
    timing: StrobeTiming,
    polls: u32,
    responses: u64,
}

impl<P: MatrixPort, L: Liveness> MatrixDriver<P, L> {
    pub fn new(port: P, liveness: L, shared: Arc<MzShared>) -> Self {
        let timing = StrobeTiming::for_machine(shared.machine_model());
        MatrixDriver {
            port,
            liveness,
            shared,
            state: DriverState::Idle,
            timing,
            polls: 0,
            responses: 0
        }
    }
    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }
    /// The number of strobes served so far.
    #[inline]
    pub fn responses(&self) -> u64 {
        self.responses
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
    /// Destructs the driver, returning the port.
    pub fn into_port(self) -> P {
        self.port
    }
    /// Runs the driver until shutdown.
    pub fn run(&mut self) {
        while !self.shared.handshake.is_shutdown() {
            self.step();
        }
        self.port.write_data(IDLE_WORD);
    }
    /// Performs a single state machine step.
    ///
    /// While [DriverState::Active] a step serves at most one strobe. Yield requests are only
    /// honored between strobes.
    pub fn step(&mut self) {
        let handshake = &self.shared.handshake;
        match self.state {
            DriverState::Idle => {
                self.port.write_data(IDLE_WORD);
                self.state = DriverState::Active;
            }
            DriverState::Active => {
                if handshake.yield_requested() {
                    self.state = DriverState::Yielding;
                    return
                }
                if self.port.strobe() {
                    self.respond();
                }
                self.polls = self.polls.wrapping_add(1);
                if self.polls % FEED_INTERVAL == 0 {
                    self.liveness.feed();
                }
            }
            DriverState::Yielding => {
                self.port.write_data(IDLE_WORD);
                if handshake.suspend_requested() {
                    handshake.acknowledge_suspended();
                    self.state = DriverState::Suspended;
                }
                else if handshake.yield_requested() {
                    self.liveness.feed();
                    thread::yield_now();
                }
                else {
                    self.timing = StrobeTiming::for_machine(self.shared.machine_model());
                    self.state = DriverState::Active;
                }
            }
            DriverState::Suspended => {
                handshake.wait_released();
                self.liveness.feed();
                self.timing = StrobeTiming::for_machine(self.shared.machine_model());
                self.state = DriverState::Active;
            }
        }
    }

    #[inline(always)]
    fn respond(&mut self) {
        let StrobeTiming { row_settle_ns, output_settle_ns } = self.timing;
        if row_settle_ns != 0 {
            self.port.delay_ns(row_settle_ns);
        }
        let row = self.port.row_address() & 0x0F;
        let mirror = &self.shared.mirror;
        let word = if self.port.row_data_required() {
            mirror.row_word(usize::from(row))
        }
        else {
            mirror.strobe_all_word()
        };
        if output_settle_ns != 0 {
            self.port.delay_ns(output_settle_ns);
        }
        self.port.write_data(word);
        self.responses += 1;
        // hold the data until the host is done with it
        while self.port.strobe() {
            if self.shared.handshake.is_shutdown() {
                break
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mz::matrix::{output_word, KeyMatrix, MatrixTarget};

    /// A host scanning rows once each, strobe asserted for two polls per row.
    #[derive(Default)]
    struct ScanningHost {
        requests: Vec<(u8, bool)>,
        cursor: usize,
        strobe_polls: u32,
        written: Vec<u32>,
        delays: Vec<u32>,
    }

    impl MatrixPort for ScanningHost {
        fn strobe(&mut self) -> bool {
            if self.cursor >= self.requests.len() {
                return false
            }
            self.strobe_polls += 1;
            if self.strobe_polls > 2 {
                self.strobe_polls = 0;
                self.cursor += 1;
                false
            }
            else {
                true
            }
        }
        fn row_address(&mut self) -> u8 {
            self.requests[self.cursor].0
        }
        fn row_data_required(&mut self) -> bool {
            self.requests[self.cursor].1
        }
        fn write_data(&mut self, word: u32) {
            self.written.push(word);
        }
        fn delay_ns(&mut self, ns: u32) {
            self.delays.push(ns);
        }
    }

    #[test]
    fn serves_rows_and_strobe_all() {
        let shared = Arc::new(MzShared::new(machine::MZ_2500));
        let mut matrix = KeyMatrix::new();
        matrix.set_active(MatrixTarget::new(0x04, 0x02));
        shared.mirror.publish(&matrix);
        let host = ScanningHost {
            requests: vec![(0x04, true), (0x05, true), (0x00, false), (0x0F, true)],
            ..ScanningHost::default()
        };
        let mut driver = MatrixDriver::new(host, || {}, Arc::clone(&shared));
        assert_eq!(driver.state(), DriverState::Idle);
        for _ in 0..10 {
            driver.step();
        }
        assert_eq!(driver.state(), DriverState::Active);
        assert_eq!(driver.responses(), 4);
        let host = driver.into_port();
        assert_eq!(host.written, [IDLE_WORD, output_word(0xFD), IDLE_WORD, output_word(0xFD), IDLE_WORD]);
        assert!(host.delays.is_empty());
    }

    #[test]
    fn yields_with_idle_outputs() {
        let shared = Arc::new(MzShared::new(machine::MZ_2800));
        let mut matrix = KeyMatrix::new();
        matrix.set_active(MatrixTarget::new(0x00, 0x01));
        shared.mirror.publish(&matrix);
        let host = ScanningHost { requests: vec![(0x00, true)], ..ScanningHost::default() };
        let mut driver = MatrixDriver::new(host, || {}, Arc::clone(&shared));
        driver.step();
        driver.step();
        assert_eq!(driver.port().written, [IDLE_WORD, output_word(0xFE)]);
        assert_eq!(driver.port().delays, [250, 100]);
        shared.handshake.set_yield(true);
        driver.step();
        assert_eq!(driver.state(), DriverState::Yielding);
        driver.step();
        assert_eq!(driver.port().written.last(), Some(&IDLE_WORD));
        assert_eq!(driver.state(), DriverState::Yielding);
        shared.handshake.set_yield(false);
        driver.step();
        assert_eq!(driver.state(), DriverState::Active);
    }

    #[test]
    fn suspends_on_request() {
        let shared = Arc::new(MzShared::new(machine::MZ_2500));
        let handshake_shared = Arc::clone(&shared);
        let driver = thread::spawn(move || {
            let mut driver = MatrixDriver::new(ScanningHost::default(), || {}, handshake_shared);
            driver.run();
            driver.into_port().written
        });
        for _ in 0..2 {
            shared.handshake.request_suspend();
            assert!(shared.handshake.wait_suspended(std::time::Duration::from_secs(5)));
            shared.handshake.release();
            while shared.handshake.is_suspended() {
                thread::yield_now();
            }
        }
        shared.handshake.shutdown();
        let written = driver.join().unwrap();
        assert!(written.iter().all(|&word| word == IDLE_WORD));
    }
}
