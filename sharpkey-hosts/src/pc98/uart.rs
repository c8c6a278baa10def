/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Bit level framing of the PC-9801 keyboard serial line.
//!
//! A frame: 1 start bit ([DataState::Space]), 8 data bits least significant first, an odd
//! parity bit and 1 stop bit ([DataState::Mark]). The idle line is held at [DataState::Mark].
//!
//! The terminology regarding the keyboard connector lines:
//!
//! * `TxD` (Transmit Data) data from the keyboard to the host.
//! * `RxD` (Receive Data) commands from the host to the keyboard.
//! * `RDY` (Ready) asserted by the host when it's ready to receive data.
use core::fmt;
use core::time::Duration;
use std::error;
use std::io;

use super::driver::SerialChannel;

/// The line speed in bits per second.
pub const BAUD_RATE: u32 = 19200;
/// The number of bits in a single frame.
pub const FRAME_BITS: usize = 11;
/// The duration of a single bit on the line.
pub const BIT_PERIOD: Duration = Duration::from_nanos(1_000_000_000 / BAUD_RATE as u64);

/// The level of the `TxD` or `RxD` line. The idle line is held at `Mark`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataState {
    /// A logical 0.
    Space = 0,
    /// A logical 1.
    Mark = 1
}

/// The level of the `RDY` line driven by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlState {
    Active,
    Inactive
}

impl DataState {
    /// Returns the line level carrying a data `bit`.
    #[inline]
    pub fn from_bit(bit: bool) -> Self {
        if bit { DataState::Mark } else { DataState::Space }
    }
    /// Returns the data bit carried by this level, 0 or 1.
    #[inline]
    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn is_space(self) -> bool {
        self == DataState::Space
    }

    pub fn is_mark(self) -> bool {
        self == DataState::Mark
    }
}

impl ControlState {
    /// Returns `Active` if the host is `ready`.
    #[inline]
    pub fn from_ready(ready: bool) -> Self {
        if ready { ControlState::Active } else { ControlState::Inactive }
    }

    pub fn is_active(self) -> bool {
        self == ControlState::Active
    }
}

/// Returns the parity bit making the number of ones in `byte` and the parity bit odd.
#[inline]
pub fn odd_parity(byte: u8) -> DataState {
    DataState::from_bit(byte.count_ones() & 1 == 0)
}

/// Returns line states of a single frame carrying `byte`.
pub fn frame_bits(byte: u8) -> [DataState; FRAME_BITS] {
    let mut bits = [DataState::Mark; FRAME_BITS];
    bits[0] = DataState::Space;
    for (n, bit) in bits[1..9].iter_mut().enumerate() {
        *bit = DataState::from_bit(byte >> n & 1 == 1);
    }
    bits[9] = odd_parity(byte);
    bits
}

/// An error decoding a received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    StartBit,
    Parity,
    StopBit,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameError::StartBit => "missing start bit",
            FrameError::Parity => "parity error",
            FrameError::StopBit => "missing stop bit",
        })
    }
}

impl error::Error for FrameError {}

/// Decodes line states of a single frame.
pub fn decode_frame(bits: &[DataState; FRAME_BITS]) -> Result<u8, FrameError> {
    if !bits[0].is_space() {
        return Err(FrameError::StartBit)
    }
    let byte = bits[1..9].iter().rev().fold(0u8, |acc, bit| acc << 1 | bit.bit());
    if bits[9] != odd_parity(byte) {
        return Err(FrameError::Parity)
    }
    if !bits[10].is_mark() {
        return Err(FrameError::StopBit)
    }
    Ok(byte)
}

/// The keyboard side lines of a bit-banged serial link.
pub trait TxLine {
    /// Sets the `TxD` line state.
    fn set_txd(&mut self, state: DataState);
    /// Waits for a single bit `period` since the last line change.
    fn wait_bit(&mut self, period: Duration);
    /// Returns the `RDY` line state.
    fn rdy(&mut self) -> ControlState {
        ControlState::Active
    }
}

/// A transmit only [SerialChannel] clocking frames out of a [TxLine] one bit at a time.
#[derive(Clone, Debug, Default)]
pub struct BitBangSerial<L> {
    pub line: L,
}

impl<L: TxLine> BitBangSerial<L> {
    pub fn new(mut line: L) -> Self {
        line.set_txd(DataState::Mark);
        BitBangSerial { line }
    }
}

impl<L: TxLine> SerialChannel for BitBangSerial<L> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        for &bit in frame_bits(byte).iter() {
            self.line.set_txd(bit);
            self.line.wait_bit(BIT_PERIOD);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(None)
    }

    fn host_ready(&mut self) -> bool {
        self.line.rdy().is_active()
    }
}
