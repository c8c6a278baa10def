/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
use std::io::{self, ErrorKind, Read, Write};
use std::slice;
use std::sync::Arc;
use std::thread;

use arrayvec::ArrayVec;
#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use sharpkey_core::sync::Liveness;

use super::Pc98Shared;

/// Bytes periodically sent by the host that carry no command.
pub const IGNORED_HOST_BYTES: [u8; 2] = [0xFA, 0xFC];

/// A byte level serial link to the PC-9801 host.
pub trait SerialChannel {
    /// Sends a single byte, blocking until it's been handed over to the line.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
    /// Receives a single byte if one is available without blocking.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;
    /// Returns `true` if the host is ready to receive data.
    fn host_ready(&mut self) -> bool {
        true
    }
}

impl<C: SerialChannel + ?Sized> SerialChannel for &mut C {
    #[inline]
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }
    #[inline]
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }
    #[inline]
    fn host_ready(&mut self) -> bool {
        (**self).host_ready()
    }
}

/// A [SerialChannel] over a pair of byte streams.
///
/// A non-blocking `reader` should report no data with [ErrorKind::WouldBlock] or `Ok(0)`.
#[derive(Clone, Debug, Default)]
pub struct IoSerial<R, W> {
    /// Provides bytes sent by the host.
    pub reader: R,
    /// Receives bytes sent to the host.
    pub writer: W,
}

impl<R, W> IoSerial<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        IoSerial { reader, writer }
    }
}

impl<R: Read, W: Write> SerialChannel for IoSerial<R, W> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let buf = slice::from_ref(&byte);
        loop {
            return match self.writer.write(buf) {
                Ok(0) => Err(ErrorKind::WriteZero.into()),
                Ok(..) => self.writer.flush(),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => Err(e)
            }
        }
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0;
        loop {
            return match self.reader.read(slice::from_mut(&mut byte)) {
                Ok(0) => Ok(None),
                Ok(..) => Ok(Some(byte)),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(e)
            }
        }
    }
}

/// Returns bytes of a transmit queue `word`, most significant first.
///
/// Zero bytes are skipped, but the least significant byte is always sent, so a `0x00`
/// key code is still a single byte.
pub fn word_bytes(word: u32) -> ArrayVec<u8, 4> {
    let bytes = word.to_be_bytes();
    let mut out: ArrayVec<u8, 4> = bytes[..3].iter().copied().filter(|&b| b != 0).collect();
    out.push(bytes[3]);
    out
}

/// The state of a [SerialDriver].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerialState {
    /// Exchanging data with the host.
    Running,
    /// Waiting for the persistent store access to complete.
    Suspended,
}

/// The real-time PC-9801 serial driver.
///
/// Sends words from the transmit queue of [Pc98Shared] and forwards the bytes received from
/// the host to its receive queue. A suspension request is honored between bytes, so a word
/// being sent is finished after the driver resumes.
pub struct SerialDriver<C, L> {
    channel: C,
    liveness: L,
    shared: Arc<Pc98Shared>,
    state: SerialState,
    pending: ArrayVec<u8, 4>,
    cursor: usize,
    sent: u64,
    dropped: u64,
}

impl<C: SerialChannel, L: Liveness> SerialDriver<C, L> {
    pub fn new(channel: C, liveness: L, shared: Arc<Pc98Shared>) -> Self {
        SerialDriver {
            channel,
            liveness,
            shared,
            state: SerialState::Running,
            pending: ArrayVec::new(),
            cursor: 0,
            sent: 0,
            dropped: 0
        }
    }
    #[inline]
    pub fn state(&self) -> SerialState {
        self.state
    }
    /// The number of bytes sent so far.
    #[inline]
    pub fn sent(&self) -> u64 {
        self.sent
    }
    /// The number of received bytes dropped due to a full receive queue.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
    /// Destructs the driver, returning the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }
    /// Runs the driver until shutdown or a channel error.
    pub fn run(&mut self) -> io::Result<()> {
        while !self.shared.handshake.is_shutdown() {
            self.step()?;
        }
        Ok(())
    }
    /// Performs a single state machine step.
    ///
    /// While [SerialState::Running] a step sends at most one byte.
    pub fn step(&mut self) -> io::Result<()> {
        match self.state {
            SerialState::Running => {
                let handshake = &self.shared.handshake;
                if handshake.suspend_requested() {
                    handshake.acknowledge_suspended();
                    self.state = SerialState::Suspended;
                    return Ok(())
                }
                self.receive()?;
                if !self.transmit()? {
                    self.liveness.feed();
                    thread::yield_now();
                }
            }
            SerialState::Suspended => {
                self.shared.handshake.wait_released();
                self.liveness.feed();
                self.state = SerialState::Running;
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> io::Result<()> {
        while let Some(byte) = self.channel.read_byte()? {
            if IGNORED_HOST_BYTES.contains(&byte) {
                continue
            }
            if self.shared.rcv.try_push(byte).is_err() {
                self.dropped += 1;
            }
        }
        Ok(())
    }
    /// Returns `false` if there was nothing to send.
    fn transmit(&mut self) -> io::Result<bool> {
        if self.cursor >= self.pending.len() {
            match self.shared.xmit.try_pop() {
                Some(word) => {
                    self.pending = word_bytes(word);
                    self.cursor = 0;
                }
                None => return Ok(false)
            }
        }
        if !self.channel.host_ready() {
            return Ok(false)
        }
        let byte = self.pending[self.cursor];
        self.channel.write_byte(byte)?;
        self.cursor += 1;
        self.sent += 1;
        Ok(true)
    }
}
