/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! The MZ-2500/MZ-2800 key matrix and its output port shaped mirror.
//!
//! ```text
//!  row   0x80   0x40   0x20   0x10   0x08   0x04   0x02   0x01
//! 0x00    F8     F7     F6     F5     F4     F3     F2     F1
//! 0x01   KP-    KP+    KP.    KP,    KP9    KP8    F10    F9
//! 0x02   KP7    KP6    KP5    KP4    KP3    KP2    KP1    KP0
//! 0x03  BREAK  RIGHT  LEFT   DOWN    UP    CR    SPACE   TAB
//! 0x04    G      F      E      D      C      B      A      /
//! 0x05    O      N      M      L      K      J      I      H
//! 0x06    W      V      U      T      S      R      Q      P
//! 0x07    ,      .      _      ¥      ^      Z      Y      X
//! 0x08    7      6      5      4      3      2      1      0
//! 0x09    ]      [      @      -      ;      :      9      8
//! 0x0A                                             KP/    KP*
//! 0x0B  ARGO   COPY   HELP   CLR    DEL   INST    BS    ESC
//! 0x0C                LOGO   CTRL  SHIFT  LOCK  GRAPH   KANA
//! 0x0D                              NFER   XFER  RDOWN   RUP
//! 0x0E
//! ```
//!
//! The matrix is kept in negative logic: a bit = 0 means the key is active.
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// The number of matrix rows.
pub const ROWS: usize = 15;
/// The row number of an unused [MatrixTarget] slot.
pub const NONE: u8 = 0xFF;

/// A single key position in the matrix.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatrixTarget {
    /// The row index or [NONE].
    pub row: u8,
    /// A single bit of the row.
    pub bit: u8,
}

impl MatrixTarget {
    pub const NONE: MatrixTarget = MatrixTarget { row: NONE, bit: 0 };

    pub const fn new(row: u8, bit: u8) -> Self {
        MatrixTarget { row, bit }
    }
    #[inline]
    pub fn is_none(self) -> bool {
        self.row == NONE
    }
    /// Returns `true` if this is either an unused slot or a valid key position.
    pub fn is_valid(self) -> bool {
        self.is_none() || (usize::from(self.row) < ROWS && self.bit.is_power_of_two())
    }
}

impl Default for MatrixTarget {
    fn default() -> Self {
        MatrixTarget::NONE
    }
}

/// The logical key matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyMatrix {
    rows: [u8; ROWS],
}

impl Default for KeyMatrix {
    fn default() -> Self {
        KeyMatrix { rows: [!0; ROWS] }
    }
}

impl KeyMatrix {
    pub fn new() -> Self {
        Self::default()
    }
    #[inline]
    pub fn rows(&self) -> &[u8; ROWS] {
        &self.rows
    }
    /// Returns the negative logic state of a row. Rows out of range read as idle.
    #[inline]
    pub fn row(&self, row: usize) -> u8 {
        self.rows.get(row).copied().unwrap_or(!0)
    }
    /// Makes a key active. Returns `true` if the matrix has changed.
    pub fn set_active(&mut self, target: MatrixTarget) -> bool {
        match self.rows.get_mut(usize::from(target.row)) {
            Some(row) if *row & target.bit != 0 => {
                *row &= !target.bit;
                true
            }
            _ => false
        }
    }
    /// Makes a key inactive. Returns `true` if the matrix has changed.
    pub fn set_inactive(&mut self, target: MatrixTarget) -> bool {
        match self.rows.get_mut(usize::from(target.row)) {
            Some(row) if *row & target.bit != target.bit => {
                *row |= target.bit;
                true
            }
            _ => false
        }
    }
    /// Returns all rows ANDed together, so a bit is 0 if its key is active in any row.
    pub fn strobe_all(&self) -> u8 {
        self.rows.iter().fold(!0, |acc, row| acc & row)
    }
    /// Returns `true` if no key is active.
    pub fn is_idle(&self) -> bool {
        self.rows.iter().all(|&row| row == !0)
    }

    pub fn release_all(&mut self) {
        self.rows = [!0; ROWS];
    }
}

/// The output port pins of the matrix data bits 0 to 7.
pub const DATA_PINS: [u8; 8] = [14, 15, 16, 17, 18, 19, 21, 22];

const fn data_pins_valid(pins: &[u8; 8]) -> bool {
    let mut mask = 0u32;
    let mut i = 0;
    while i < pins.len() {
        if pins[i] >= 32 || mask & (1 << pins[i]) != 0 {
            return false
        }
        mask |= 1 << pins[i];
        i += 1;
    }
    true
}

const _: () = assert!(data_pins_valid(&DATA_PINS), "data pins must be distinct port bits");

const fn build_pin_remap() -> [u32; 256] {
    let mut remap = [0u32; 256];
    let mut value = 0;
    while value < 256 {
        let mut word = 0u32;
        let mut bit = 0;
        while bit < 8 {
            if value & (1 << bit) != 0 {
                word |= 1 << DATA_PINS[bit];
            }
            bit += 1;
        }
        remap[value] = word;
        value += 1;
    }
    remap
}

static PIN_REMAP: [u32; 256] = build_pin_remap();

/// Places the 8 logical data bits onto their output port [DATA_PINS].
#[inline(always)]
pub fn pin_remap(bits: u8) -> u32 {
    PIN_REMAP[usize::from(bits)]
}

/// Converts a negative logic matrix row to the positive logic output port word.
#[inline(always)]
pub fn output_word(row: u8) -> u32 {
    pin_remap(!row)
}

/// The output port word when no key is active.
pub const IDLE_WORD: u32 = 0;

/// The output port shaped copy of a [KeyMatrix].
///
/// There is a single writer (the acquisition loop) and a single reader (the real-time driver).
/// Every row is a single word, so a row is never observed partially updated.
#[derive(Debug, Default)]
pub struct MirrorMatrix {
    rows: [AtomicU32; ROWS],
    strobe_all: AtomicU32,
}

impl MirrorMatrix {
    pub fn new() -> Self {
        Self::default()
    }
    /// Recomputes the mirror from `matrix`.
    pub fn publish(&self, matrix: &KeyMatrix) {
        for (word, &row) in self.rows.iter().zip(matrix.rows().iter()) {
            word.store(output_word(row), Ordering::Relaxed);
        }
        self.strobe_all.store(output_word(matrix.strobe_all()), Ordering::Release);
    }
    /// Returns the output word of a row. Rows out of range read as [IDLE_WORD].
    #[inline(always)]
    pub fn row_word(&self, row: usize) -> u32 {
        match self.rows.get(row) {
            Some(word) => word.load(Ordering::Relaxed),
            None => IDLE_WORD
        }
    }
    /// Returns the output word of all the rows ANDed together.
    #[inline(always)]
    pub fn strobe_all_word(&self) -> u32 {
        self.strobe_all.load(Ordering::Acquire)
    }
    /// Returns `true` if any key is active.
    #[inline]
    pub fn any_active(&self) -> bool {
        self.strobe_all_word() != IDLE_WORD
    }
    /// Returns a copy of all row words.
    pub fn row_words(&self) -> [u32; ROWS] {
        let mut words = [IDLE_WORD; ROWS];
        for (word, atomic) in words.iter_mut().zip(self.rows.iter()) {
            *word = atomic.load(Ordering::Relaxed);
        }
        words
    }
}
