//! Virtual hosts observing the keyboard port.
use core::time::Duration;
use std::sync::{Arc, Mutex};
use std::thread;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use sharpkey::mz::{MatrixPort, matrix::{output_word, IDLE_WORD, ROWS}};
use sharpkey::pc98::uart::{decode_frame, DataState, TxLine, FRAME_BITS};

/// The output words most recently read by the virtual MZ host, one per row.
pub type Frame = Arc<Mutex<[u32; ROWS]>>;

/// Converts an output port word back to a negative logic matrix row.
pub fn row_bits(word: u32) -> Option<u8> {
    (0..=255u8).find(|&row| output_word(row) == word)
}

/// An MZ host scanning the rows one after another.
pub struct ScanningHost {
    frame: Frame,
    strobe: bool,
    row: usize,
    addressed: Option<usize>,
}

impl ScanningHost {
    pub fn new(frame: Frame) -> Self {
        ScanningHost { frame, strobe: false, row: 0, addressed: None }
    }
}

impl MatrixPort for ScanningHost {
    fn strobe(&mut self) -> bool {
        self.strobe = !self.strobe;
        if !self.strobe {
            thread::yield_now();
        }
        self.strobe
    }

    fn row_address(&mut self) -> u8 {
        let row = self.row;
        self.row = (row + 1) % ROWS;
        self.addressed = Some(row);
        row as u8
    }

    fn row_data_required(&mut self) -> bool {
        true
    }

    fn write_data(&mut self, word: u32) {
        let mut frame = match self.frame.lock() {
            Ok(frame) => frame,
            Err(err) => err.into_inner()
        };
        match self.addressed.take() {
            Some(row) => frame[row] = word,
            // outputs forced inactive while the driver yields
            None => frame.iter_mut().for_each(|w| *w = IDLE_WORD)
        }
    }
}

/// The PC-9801 host side of the `TxD` line, decoding frames as they're clocked in.
pub struct SerialLine {
    received: Arc<Mutex<Vec<u8>>>,
    bits: Vec<DataState>,
    realtime: bool,
}

impl SerialLine {
    pub fn new(received: Arc<Mutex<Vec<u8>>>, realtime: bool) -> Self {
        SerialLine { received, bits: Vec::with_capacity(FRAME_BITS), realtime }
    }
}

impl TxLine for SerialLine {
    fn set_txd(&mut self, state: DataState) {
        if self.bits.is_empty() && state.is_mark() {
            return
        }
        self.bits.push(state);
        if self.bits.len() < FRAME_BITS {
            return
        }
        let mut frame = [DataState::Mark; FRAME_BITS];
        frame.copy_from_slice(&self.bits);
        self.bits.clear();
        match decode_frame(&frame) {
            Ok(byte) => match self.received.lock() {
                Ok(mut received) => received.push(byte),
                Err(err) => err.into_inner().push(byte)
            }
            Err(err) => warn!("host: {}", err)
        }
    }

    fn wait_bit(&mut self, period: Duration) {
        if self.realtime {
            thread::sleep(period);
        }
    }
}
