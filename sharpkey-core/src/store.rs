/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Persistent storage capabilities.
//!
//! On the embedded targets the underlying storage requires every execution context to be
//! quiescent while it's written, so the stores are only accessed from within the suspend
//! handshake (see [crate::sync::SuspendHandshake]).
use core::fmt;
use std::collections::HashMap;
use std::error;
use std::io;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use crate::keymap::{KeyMap, KeyMapEntry, RecordAction};

/// An error of a persistent store.
#[derive(Debug)]
pub enum StoreError {
    /// The requested item doesn't exist.
    NotFound,
    /// The stored data is corrupted.
    Corrupt(&'static str),
    /// The real-time driver didn't become quiescent in time.
    Busy,
    Io(io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            _ => None
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => f.write_str("no such item in the store"),
            StoreError::Corrupt(what) => write!(f, "corrupted data: {}", what),
            StoreError::Busy => f.write_str("timed out waiting for the host driver to suspend"),
            StoreError::Io(err) => write!(f, "store i/o error: {}", err),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound
        }
        else {
            StoreError::Io(err)
        }
    }
}

/// A key-value store for the configuration.
///
/// Writes become durable only after a successful [ConfigStore::commit].
pub trait ConfigStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>>;
    fn store(&mut self, key: &str, data: &[u8]) -> StoreResult<()>;
    fn commit(&mut self) -> StoreResult<()>;
}

/// A file store for key map overrides.
pub trait TableStore {
    /// Reads the whole content of a key map file.
    fn read_table(&mut self, name: &str) -> StoreResult<Vec<u8>>;
    /// Replaces the whole content of a key map file.
    fn write_table(&mut self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Loads a key map override.
    ///
    /// Returns `None` if the file is missing or if its size isn't a whole number of rows
    /// or any of the rows is invalid.
    fn load_extension<A: RecordAction + Copy>(&mut self, name: &str) -> Option<Vec<KeyMapEntry<A>>>
        where Self: Sized
    {
        let data = match self.read_table(name) {
            Ok(data) => data,
            Err(err) => {
                debug!("key map {}: {}", name, err);
                return None
            }
        };
        match KeyMap::<A>::from_bytes(&data) {
            Ok(keymap) => Some(keymap.entries().to_vec()),
            Err(err) => {
                warn!("key map {}: {}", name, err);
                None
            }
        }
    }
}

impl<T: ConfigStore + ?Sized> ConfigStore for &mut T {
    #[inline]
    fn load(&mut self, key: &str) -> Option<Vec<u8>> {
        (**self).load(key)
    }
    #[inline]
    fn store(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        (**self).store(key, data)
    }
    #[inline]
    fn commit(&mut self) -> StoreResult<()> {
        (**self).commit()
    }
}

impl<T: TableStore + ?Sized> TableStore for &mut T {
    #[inline]
    fn read_table(&mut self, name: &str) -> StoreResult<Vec<u8>> {
        (**self).read_table(name)
    }
    #[inline]
    fn write_table(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        (**self).write_table(name, data)
    }
}

/// Loads a key map override from `store` or falls back to the `builtin` table.
///
/// On fallback the built-in table is written to the store, so it can be edited and loaded
/// as an override later. Failing to write it is only logged.
pub fn load_keymap_or_builtin<A, S>(store: &mut S, name: &str, builtin: &[KeyMapEntry<A>]) -> KeyMap<A>
    where A: RecordAction + Copy,
          S: TableStore
{
    if let Some(entries) = store.load_extension::<A>(name) {
        info!("key map {}: loaded {} rows", name, entries.len());
        return KeyMap::new(entries)
    }
    warn!("key map {}: using the built-in table", name);
    let keymap = KeyMap::from_builtin(builtin);
    if let Err(err) = store.write_table(name, &keymap.to_bytes()) {
        warn!("key map {}: can't persist the built-in table: {}", name, err);
    }
    keymap
}

/// An in-memory implementation of both stores.
///
/// Stored configuration is visible to [ConfigStore::load] only after a commit.
/// Failures can be injected to exercise recovery paths.
#[derive(Clone, Default, Debug)]
pub struct MemoryStore {
    pub committed: HashMap<String, Vec<u8>>,
    pub pending: HashMap<String, Vec<u8>>,
    pub tables: HashMap<String, Vec<u8>>,
    /// When set, `store` and `commit` and `write_table` fail.
    pub fail_writes: bool,
    /// The number of successful commits.
    pub commits: usize,
}

impl MemoryStore {
    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes {
            Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "write protected")))
        }
        else {
            Ok(())
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>> {
        self.committed.get(key).cloned()
    }

    fn store(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.check_writable()?;
        self.pending.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.check_writable()?;
        self.committed.extend(self.pending.drain());
        self.commits += 1;
        Ok(())
    }
}

impl TableStore for MemoryStore {
    fn read_table(&mut self, name: &str) -> StoreResult<Vec<u8>> {
        self.tables.get(name).cloned().ok_or(StoreError::NotFound)
    }

    fn write_table(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        self.check_writable()?;
        self.tables.insert(name.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{CtrlMask, MACHINE_ALL, keyboard};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Key(u8);

    impl RecordAction for Key {
        const SIZE: usize = 1;
        fn write_record(&self, out: &mut [u8]) {
            out[0] = self.0;
        }
        fn read_record(data: &[u8]) -> Option<Self> {
            Some(Key(data[0]))
        }
    }

    static BUILTIN: [KeyMapEntry<Key>; 2] = [
        KeyMapEntry::new(0x41, CtrlMask::empty(), keyboard::STANDARD, MACHINE_ALL, Key(0x1D)),
        KeyMapEntry::new(0x42, CtrlMask::SHIFT, keyboard::STANDARD, MACHINE_ALL, Key(0x2D)),
    ];

    #[test]
    fn config_store_commits() {
        let mut store = MemoryStore::default();
        store.store("cfg", &[1, 2]).unwrap();
        assert_eq!(store.load("cfg"), None);
        store.commit().unwrap();
        assert_eq!(store.load("cfg"), Some(vec![1, 2]));
        store.fail_writes = true;
        assert!(matches!(store.store("cfg", &[3, 4]), Err(StoreError::Io(..))));
        assert_eq!(store.load("cfg"), Some(vec![1, 2]));
    }

    #[test]
    fn falls_back_to_builtin_and_persists_it() {
        let mut store = MemoryStore::default();
        let keymap = load_keymap_or_builtin(&mut store, "test.bin", &BUILTIN);
        assert_eq!(keymap.entries(), &BUILTIN[..]);
        assert_eq!(store.tables["test.bin"].len(), 2 * 5);
        // a corrupted override
        store.tables.get_mut("test.bin").unwrap().push(0);
        assert!(store.load_extension::<Key>("test.bin").is_none());
        let keymap = load_keymap_or_builtin(&mut store, "test.bin", &BUILTIN);
        assert_eq!(keymap.len(), 2);
        assert_eq!(store.tables["test.bin"].len(), 10);
    }

    #[test]
    fn loads_an_override() {
        let mut store = MemoryStore::default();
        let data = [0x43, 0x00, 0xFF, 0xFF, 0x2B];
        store.write_table("test.bin", &data).unwrap();
        let keymap = load_keymap_or_builtin(&mut store, "test.bin", &BUILTIN);
        assert_eq!(keymap.entries(), &[
            KeyMapEntry::new(0x43, CtrlMask::empty(), keyboard::STANDARD, MACHINE_ALL, Key(0x2B))
        ]);
    }

    #[test]
    fn fallback_survives_write_failure() {
        let mut store = MemoryStore { fail_writes: true, ..MemoryStore::default() };
        let keymap = load_keymap_or_builtin(&mut store, "test.bin", &BUILTIN);
        assert_eq!(keymap.len(), 2);
        assert!(store.tables.is_empty());
    }
}
