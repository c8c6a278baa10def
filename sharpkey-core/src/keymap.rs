/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Key mapping tables and the table matching rules.
//!
//! A key map is an ordered list of [KeyMapEntry] rows. The same row shape is shared by every
//! host target, only the action payload `A` differs.
//!
//! Scanning a table for a [ScanCode]:
//!
//! * A row is a *candidate* if its `ps2_code` equals the scanned key, its `machines` mask
//!   intersects the active machine model (or is [MACHINE_ALL]) and its `keyboards` mask
//!   intersects the active keyboard model.
//! * A candidate *matches* if every modifier required by its [CtrlMask] is present in the
//!   scan code flags. A row with no modifiers required always matches.
//! * A match is *exact* if the tracked modifiers (all but `CAPS`) of the scan code equal
//!   the row's required modifiers bit for bit. Rows flagged [CtrlMask::EXACT] only match exactly.
//! * Scanning goes on after a non-exact match and stops at the first exact one.
//!
//! The order of rows is significant: more specific rows must precede the generic ones for the
//! same key. [KeyMap::validate] reports rows that violate this rule.
use core::fmt;
use core::iter::FusedIterator;
use std::error;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use bitflags::bitflags;

use crate::{byte_flags, flag_groups};
use crate::scancode::{KeyFlags, ScanCode};

bitflags! {
    /// Modifiers required by a [KeyMapEntry] row.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
    pub struct CtrlMask: u8 {
        const SHIFT = 0b0000_0001;
        const CTRL  = 0b0000_0010;
        const CAPS  = 0b0000_0100;
        const ALT   = 0b0000_1000;
        const ALTGR = 0b0001_0000;
        const GUI   = 0b0010_0000;
        const FUNC  = 0b0100_0000;
        /// The row applies only when the modifiers match exactly.
        const EXACT = 0b1000_0000;
    }
}
byte_flags!(CtrlMask);
flag_groups!(CtrlMask {
    /// All the modifier flags, excluding `EXACT`.
    pub const MODIFIERS = SHIFT|CTRL|CAPS|ALT|ALTGR|GUI|FUNC;
    /// Modifiers compared when determining an exact match.
    pub const TRACKED = SHIFT|CTRL|ALT|ALTGR|GUI|FUNC;
});

/// A machine mask value selecting every machine model.
pub const MACHINE_ALL: u8 = 0xFF;

/// Physical keyboard layouts, each a single bit of the `keyboards` mask of a [KeyMapEntry].
pub mod keyboard {
    pub const UK_WYSE_KB3926:     u8 = 0x01;
    pub const JAPAN_OADG109:      u8 = 0x02;
    pub const JAPAN_SANWA_SKBL1:  u8 = 0x04;
    pub const NOT_ASSIGNED_4:     u8 = 0x08;
    pub const UK_PERIBOARD_810:   u8 = 0x10;
    pub const UK_OMOTON_K8508:    u8 = 0x20;
    pub const NOT_ASSIGNED_7:     u8 = 0x40;
    pub const NOT_ASSIGNED_8:     u8 = 0x80;
    /// Rows applicable to any keyboard.
    pub const STANDARD:           u8 = 0xFF;
    /// Japanese (JIS) layouts.
    pub const JAPANESE:           u8 = JAPAN_OADG109|JAPAN_SANWA_SKBL1;
    /// Everything but the japanese layouts.
    pub const WESTERN:            u8 = !JAPANESE;

    /// Returns the name of a single keyboard model bit.
    pub fn name(model: u8) -> &'static str {
        match model {
            UK_WYSE_KB3926    => "UK Wyse KB-3926",
            JAPAN_OADG109     => "Japan OADG109",
            JAPAN_SANWA_SKBL1 => "Japan Sanwa SKB-L1",
            UK_PERIBOARD_810  => "UK Periboard 810",
            UK_OMOTON_K8508   => "UK Omoton K8508",
            NOT_ASSIGNED_4|NOT_ASSIGNED_7|NOT_ASSIGNED_8 => "Not assigned",
            _ => "Unknown"
        }
    }
}

impl CtrlMask {
    /// Converts scan code modifier flags to the equivalent row modifier flags.
    pub fn from_key_flags(flags: KeyFlags) -> Self {
        const PAIRS: [(KeyFlags, CtrlMask); 7] = [
            (KeyFlags::SHIFT,    CtrlMask::SHIFT),
            (KeyFlags::CTRL,     CtrlMask::CTRL),
            (KeyFlags::CAPS,     CtrlMask::CAPS),
            (KeyFlags::ALT,      CtrlMask::ALT),
            (KeyFlags::ALTGR,    CtrlMask::ALTGR),
            (KeyFlags::GUI,      CtrlMask::GUI),
            (KeyFlags::FUNCTION, CtrlMask::FUNC),
        ];
        let mut mask = CtrlMask::empty();
        for &(flag, ctrl) in PAIRS.iter() {
            if flags.contains(flag) {
                mask |= ctrl;
            }
        }
        mask
    }
    /// Converts the required modifiers back to scan code flags.
    pub fn to_key_flags(self) -> KeyFlags {
        let mut flags = KeyFlags::empty();
        flags.set(KeyFlags::SHIFT, self.contains(CtrlMask::SHIFT));
        flags.set(KeyFlags::CTRL, self.contains(CtrlMask::CTRL));
        flags.set(KeyFlags::CAPS, self.contains(CtrlMask::CAPS));
        flags.set(KeyFlags::ALT, self.contains(CtrlMask::ALT));
        flags.set(KeyFlags::ALTGR, self.contains(CtrlMask::ALTGR));
        flags.set(KeyFlags::GUI, self.contains(CtrlMask::GUI));
        flags.set(KeyFlags::FUNCTION, self.contains(CtrlMask::FUNC));
        flags
    }
}

/// A fixed size binary record layout of a key map action.
///
/// Key map overrides are stored as packed rows, each row being the 4 matching bytes
/// followed by `SIZE` action bytes. Changing the layout is a breaking format change.
pub trait RecordAction: Sized {
    /// The size of the action part of a row in bytes.
    const SIZE: usize;
    /// Writes the action to `out` which is exactly `SIZE` bytes long.
    fn write_record(&self, out: &mut [u8]);
    /// Reads the action from `data` which is exactly `SIZE` bytes long.
    ///
    /// Returns `None` if the data is not a valid action.
    fn read_record(data: &[u8]) -> Option<Self>;
}

/// A single row of a key map table.
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyMapEntry<A> {
    /// The scanned key identifier.
    pub ps2_code: u8,
    /// Modifiers required for this row to match.
    pub ctrl: CtrlMask,
    /// A mask of [keyboard] models this row applies to.
    pub keyboards: u8,
    /// A mask of target machine models this row applies to.
    pub machines: u8,
    /// The target specific action.
    pub action: A,
}

/// How a matching row matched a scan code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// Required modifiers are present but some additional modifiers are present too.
    Partial,
    /// Tracked modifiers are exactly the required ones.
    Exact
}

impl<A> KeyMapEntry<A> {
    /// The size of the matching fields in a binary row.
    pub const HEADER_SIZE: usize = 4;

    pub const fn new(ps2_code: u8, ctrl: CtrlMask, keyboards: u8, machines: u8, action: A) -> Self {
        KeyMapEntry { ps2_code, ctrl, keyboards, machines, action }
    }
    /// Returns `true` if this row is a candidate for a key `code` with the given active models.
    #[inline]
    pub fn is_candidate(&self, code: u8, keyboard_model: u8, machine_model: u8) -> bool {
        self.ps2_code == code
        && (self.machines == MACHINE_ALL || self.machines & machine_model != 0)
        && self.keyboards & keyboard_model != 0
    }
    /// Returns the modifiers required by this row, without the `EXACT` flag.
    #[inline]
    pub fn required(&self) -> CtrlMask {
        self.ctrl & CtrlMask::MODIFIERS
    }
    /// Returns `true` if this row is flagged as matching exactly only.
    #[inline]
    pub fn is_exact_only(&self) -> bool {
        self.ctrl.contains(CtrlMask::EXACT)
    }
    /// Matches the modifier `flags` of a scan code against this row.
    ///
    /// Returns `None` if the row doesn't match.
    pub fn match_flags(&self, flags: KeyFlags) -> Option<MatchKind> {
        let required = self.required();
        let present = CtrlMask::from_key_flags(flags);
        if !present.contains(required) {
            return None
        }
        if (present & CtrlMask::TRACKED) == (required & CtrlMask::TRACKED) {
            Some(MatchKind::Exact)
        }
        else if self.is_exact_only() {
            None
        }
        else {
            Some(MatchKind::Partial)
        }
    }
}

impl<A: RecordAction> KeyMapEntry<A> {
    /// The size of the binary row.
    pub const RECORD_SIZE: usize = Self::HEADER_SIZE + A::SIZE;

    /// Writes a binary row to `out` which must be exactly [Self::RECORD_SIZE] bytes long.
    pub fn write_record(&self, out: &mut [u8]) {
        let (header, action) = out.split_at_mut(Self::HEADER_SIZE);
        header.copy_from_slice(&[self.ps2_code, self.ctrl.bits(), self.keyboards, self.machines]);
        self.action.write_record(action);
    }
    /// Reads a binary row from `data` which must be exactly [Self::RECORD_SIZE] bytes long.
    pub fn read_record(data: &[u8]) -> Option<Self> {
        if data.len() != Self::RECORD_SIZE {
            return None
        }
        let (header, action) = data.split_at(Self::HEADER_SIZE);
        let action = A::read_record(action)?;
        Some(KeyMapEntry {
            ps2_code: header[0],
            ctrl: CtrlMask::from_bits_retain(header[1]),
            keyboards: header[2],
            machines: header[3],
            action
        })
    }
}

/// A matched row reported by [Matches].
#[derive(Debug, PartialEq, Eq)]
pub struct Match<'a, A> {
    /// The index of the row in the table.
    pub index: usize,
    pub entry: &'a KeyMapEntry<A>,
    pub kind: MatchKind,
}

/// An iterator over rows matching a scan code, in table order.
///
/// Created by [KeyMap::matches].
#[derive(Clone, Debug)]
pub struct Matches<'a, A> {
    entries: &'a [KeyMapEntry<A>],
    cursor: usize,
    scan: ScanCode,
    keyboard_model: u8,
    machine_model: u8,
}

impl<'a, A> Iterator for Matches<'a, A> {
    type Item = Match<'a, A>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.entries.get(self.cursor) {
            let index = self.cursor;
            self.cursor += 1;
            if !entry.is_candidate(self.scan.code, self.keyboard_model, self.machine_model) {
                continue
            }
            if let Some(kind) = entry.match_flags(self.scan.flags) {
                if kind == MatchKind::Exact {
                    self.cursor = self.entries.len();
                }
                return Some(Match { index, entry, kind })
            }
        }
        None
    }
}

impl<A> FusedIterator for Matches<'_, A> {}

/// An error while decoding a binary key map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// The data length is not a multiple of the row size.
    Size { len: usize, record: usize },
    /// There are no rows.
    Empty,
    /// The row at the given index is not valid.
    Record(usize),
}

pub type TableResult<T> = Result<T, TableError>;

impl error::Error for TableError {}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Size { len, record } => write!(f,
                "key map data size {} is not a multiple of the row size {}", len, record),
            TableError::Empty => f.write_str("key map has no rows"),
            TableError::Record(index) => write!(f, "key map row {} is invalid", index),
        }
    }
}

/// A problem found by [KeyMap::validate].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableIssue {
    /// The row never matches its own modifier combination for any of its models,
    /// because earlier rows end the scan first.
    Unreachable { row: usize },
    /// When the row's own modifier combination is scanned, an earlier row `by` matches
    /// too and its action is applied together with this row's.
    Overlapped { row: usize, by: usize },
}

/// An owned, ordered key map table.
///
/// Built-in tables are static read-only slices; a key map always owns a copy of its rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyMap<A> {
    entries: Vec<KeyMapEntry<A>>,
}

impl<A: Copy> KeyMap<A> {
    /// Creates a key map by copying the rows of a built-in table.
    pub fn from_builtin(table: &[KeyMapEntry<A>]) -> Self {
        KeyMap { entries: table.to_vec() }
    }
}

impl<A> KeyMap<A> {
    pub fn new(entries: Vec<KeyMapEntry<A>>) -> Self {
        KeyMap { entries }
    }
    #[inline]
    pub fn entries(&self) -> &[KeyMapEntry<A>] {
        &self.entries
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Returns an iterator of rows matching the `scan` code with the given active models.
    pub fn matches(&self, scan: ScanCode, keyboard_model: u8, machine_model: u8) -> Matches<'_, A> {
        Matches {
            entries: &self.entries,
            cursor: 0,
            scan,
            keyboard_model,
            machine_model
        }
    }
    /// Checks the ordering of rows.
    ///
    /// Every row is scanned with its own required modifiers, for every single keyboard model
    /// and machine model bit it applies to. `machine_bits` are the defined machine model bits
    /// of the target and are used for rows with the [MACHINE_ALL] mask.
    pub fn validate(&self, machine_bits: u8) -> Vec<TableIssue> {
        let mut issues = Vec::new();
        for (row, entry) in self.entries.iter().enumerate() {
            let flags = entry.required().to_key_flags();
            let scan = ScanCode::make(entry.ps2_code, flags);
            let machines = if entry.machines == MACHINE_ALL { machine_bits } else { entry.machines };
            let mut reachable = false;
            for kbd in bits_of(entry.keyboards) {
                for machine in bits_of(machines) {
                    for m in self.matches(scan, kbd, machine) {
                        if m.index == row {
                            reachable = true;
                            break
                        }
                        let issue = TableIssue::Overlapped { row, by: m.index };
                        if m.kind == MatchKind::Partial && !issues.contains(&issue) {
                            issues.push(issue);
                        }
                    }
                }
            }
            if !reachable {
                issues.push(TableIssue::Unreachable { row });
            }
        }
        issues
    }
}

impl<A: RecordAction> KeyMap<A> {
    /// Serializes rows to the packed binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = KeyMapEntry::<A>::RECORD_SIZE;
        let mut data = vec![0u8; self.entries.len() * size];
        for (entry, out) in self.entries.iter().zip(data.chunks_exact_mut(size)) {
            entry.write_record(out);
        }
        data
    }
    /// Deserializes rows from the packed binary layout.
    ///
    /// The row count is the data size divided by the row size.
    pub fn from_bytes(data: &[u8]) -> TableResult<Self> {
        let record = KeyMapEntry::<A>::RECORD_SIZE;
        if data.len() % record != 0 {
            return Err(TableError::Size { len: data.len(), record })
        }
        if data.is_empty() {
            return Err(TableError::Empty)
        }
        let entries = data.chunks_exact(record).enumerate().map(|(index, chunk)| {
            KeyMapEntry::read_record(chunk).ok_or(TableError::Record(index))
        }).collect::<TableResult<Vec<_>>>()?;
        Ok(KeyMap { entries })
    }
}

impl<A> From<Vec<KeyMapEntry<A>>> for KeyMap<A> {
    fn from(entries: Vec<KeyMapEntry<A>>) -> Self {
        KeyMap { entries }
    }
}

/// Iterates over single bits set in `mask`.
fn bits_of(mask: u8) -> impl Iterator<Item=u8> {
    (0..8).map(|n| 1u8 << n).filter(move |bit| mask & bit != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scancode::ps2key;
    use crate::assert_single_bit_flags;
    use rand::prelude::*;
    use rand::rngs::SmallRng;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Tag(u8);

    impl RecordAction for Tag {
        const SIZE: usize = 1;
        fn write_record(&self, out: &mut [u8]) {
            out[0] = self.0;
        }
        fn read_record(data: &[u8]) -> Option<Self> {
            if data[0] == 0xFF { None } else { Some(Tag(data[0])) }
        }
    }

    const SHIFT: CtrlMask = CtrlMask::SHIFT;
    const NONE: CtrlMask = CtrlMask::empty();
    const ALL: u8 = keyboard::STANDARD;

    fn table() -> KeyMap<Tag> {
        KeyMap::new(vec![
            KeyMapEntry::new(ps2key::N1, SHIFT.union(CtrlMask::EXACT), ALL, MACHINE_ALL, Tag(1)),
            KeyMapEntry::new(ps2key::N1, NONE, ALL, MACHINE_ALL, Tag(2)),
            KeyMapEntry::new(ps2key::N2, SHIFT, keyboard::UK_WYSE_KB3926, MACHINE_ALL, Tag(3)),
            KeyMapEntry::new(ps2key::N2, CtrlMask::CTRL, ALL, 0x02, Tag(4)),
            KeyMapEntry::new(ps2key::N2, NONE, ALL, MACHINE_ALL, Tag(5)),
        ])
    }

    fn tags(map: &KeyMap<Tag>, scan: ScanCode, kbd: u8, machine: u8) -> Vec<u8> {
        map.matches(scan, kbd, machine).map(|m| m.entry.action.0).collect()
    }

    #[test]
    fn ctrl_mask_all_bits_defined() {
        assert_single_bit_flags!(CtrlMask, 8);
    }

    #[test]
    fn ctrl_mask_converts_flags() {
        let flags = KeyFlags::SHIFT|KeyFlags::FUNCTION|KeyFlags::BREAK;
        let mask = CtrlMask::from_key_flags(flags);
        assert_eq!(mask, CtrlMask::SHIFT|CtrlMask::FUNC);
        assert_eq!(mask.to_key_flags(), KeyFlags::SHIFT|KeyFlags::FUNCTION);
    }

    #[test]
    fn exact_row_wins_and_stops() {
        let map = table();
        let kbd = keyboard::JAPAN_OADG109;
        assert_eq!(tags(&map, ScanCode::make(ps2key::N1, KeyFlags::SHIFT), kbd, 1), [1]);
        assert_eq!(tags(&map, ScanCode::make(ps2key::N1, KeyFlags::empty()), kbd, 1), [2]);
        // caps is not tracked
        assert_eq!(tags(&map, ScanCode::make(ps2key::N1, KeyFlags::SHIFT|KeyFlags::CAPS), kbd, 1), [1]);
        // an exact-only row is skipped for a superset
        assert_eq!(tags(&map, ScanCode::make(ps2key::N1, KeyFlags::SHIFT|KeyFlags::CTRL), kbd, 1), [2]);
    }

    #[test]
    fn partial_matches_fall_through() {
        let map = table();
        let scan = ScanCode::make(ps2key::N2, KeyFlags::SHIFT|KeyFlags::CTRL);
        assert_eq!(tags(&map, scan, keyboard::UK_WYSE_KB3926, 0x02), [3, 4, 5]);
        assert_eq!(tags(&map, scan, keyboard::JAPAN_OADG109, 0x02), [4, 5]);
        assert_eq!(tags(&map, scan, keyboard::JAPAN_OADG109, 0x01), [5]);
        let scan = ScanCode::make(ps2key::N2, KeyFlags::SHIFT);
        assert_eq!(tags(&map, scan, keyboard::UK_WYSE_KB3926, 0x01), [3]);
        assert_eq!(tags(&map, scan, keyboard::JAPAN_OADG109, 0x01), [5]);
        let scan = ScanCode::make(ps2key::N3, KeyFlags::SHIFT);
        assert!(tags(&map, scan, ALL, 0x01).is_empty());
    }

    #[test]
    fn validate_reports_order_problems() {
        assert!(table().validate(0x0F).is_empty());
        let map = KeyMap::new(vec![
            KeyMapEntry::new(ps2key::N1, NONE, ALL, MACHINE_ALL, Tag(2)),
            KeyMapEntry::new(ps2key::N1, SHIFT, ALL, MACHINE_ALL, Tag(1)),
            KeyMapEntry::new(ps2key::A, SHIFT, ALL, MACHINE_ALL, Tag(3)),
            KeyMapEntry::new(ps2key::A, SHIFT, keyboard::UK_WYSE_KB3926, MACHINE_ALL, Tag(4)),
        ]);
        assert_eq!(map.validate(0x0F), [
            TableIssue::Overlapped { row: 1, by: 0 },
            TableIssue::Unreachable { row: 3 },
        ]);
    }

    #[test]
    fn binary_rows() {
        let map = table();
        let data = map.to_bytes();
        assert_eq!(data.len(), 5 * 5);
        assert_eq!(&data[..5], &[ps2key::N1, 0x81, 0xFF, 0xFF, 1]);
        assert_eq!(KeyMap::<Tag>::from_bytes(&data), Ok(map));
        assert_eq!(KeyMap::<Tag>::from_bytes(&data[..7]), Err(TableError::Size { len: 7, record: 5 }));
        assert_eq!(KeyMap::<Tag>::from_bytes(&[]), Err(TableError::Empty));
        let mut bad = data.clone();
        bad[14] = 0xFF;
        assert_eq!(KeyMap::<Tag>::from_bytes(&bad), Err(TableError::Record(2)));
    }

    #[test]
    fn scan_stops_at_first_exact_match() {
        let map = table();
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let code = [ps2key::N1, ps2key::N2, ps2key::N3][rng.gen_range(0..3)];
            let flags = KeyFlags::from_data(rng.gen());
            let kbd = 1u8 << rng.gen_range(0..8);
            let machine = 1u8 << rng.gen_range(0..4);
            let matched: Vec<_> = map.matches(ScanCode::from(u16::from(flags.bits()) << 8 | code as u16),
                                              kbd, machine).collect();
            let exact = matched.iter().filter(|m| m.kind == MatchKind::Exact).count();
            assert!(exact <= 1);
            if exact == 1 {
                assert_eq!(matched.last().unwrap().kind, MatchKind::Exact);
            }
            assert!(matched.windows(2).all(|w| w[0].index < w[1].index));
        }
    }
}
