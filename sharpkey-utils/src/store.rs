/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! A persistent store keeping every item in a separate file of a single directory.
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use sharpkey_core::store::{ConfigStore, StoreError, StoreResult, TableStore};

/// The extension of configuration item files.
pub const CONFIG_EXT: &str = "cfg";

/// A [ConfigStore] and a [TableStore] backed by a file system directory.
///
/// Configuration items are kept in `<key>.cfg` files, key map tables under their own names.
/// Configuration writes are buffered until [ConfigStore::commit]. Each file is replaced
/// by writing a temporary file first and renaming it, so a crash never leaves a partially
/// written item behind.
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    pending: HashMap<String, Vec<u8>>,
}

impl DirStore {
    /// Opens a store in the `root` directory, creating it if necessary.
    pub fn open<P: Into<PathBuf>>(root: P) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("store: {}", root.display());
        Ok(DirStore { root, pending: HashMap::new() })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
    /// Returns `true` if there are configuration items waiting for a commit.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    fn config_path(&self, key: &str) -> PathBuf {
        self.root.join(key).with_extension(CONFIG_EXT)
    }
}

fn check_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StoreError::Corrupt("invalid store entry name"))
    }
    Ok(())
}

/// Appends `.tmp` to the file name, so files differing only by extension don't collide.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn replace_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

impl ConfigStore for DirStore {
    fn load(&mut self, key: &str) -> Option<Vec<u8>> {
        check_name(key).ok()?;
        match fs::read(self.config_path(key)) {
            Ok(data) => Some(data),
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!("store: can't read {}: {}", key, err);
                }
                None
            }
        }
    }

    fn store(&mut self, key: &str, data: &[u8]) -> StoreResult<()> {
        check_name(key)?;
        self.pending.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        for (key, data) in self.pending.drain() {
            let path = self.root.join(&key).with_extension(CONFIG_EXT);
            replace_file(&path, &data)?;
            debug!("store: {} committed", key);
        }
        Ok(())
    }
}

impl TableStore for DirStore {
    fn read_table(&mut self, name: &str) -> StoreResult<Vec<u8>> {
        check_name(name)?;
        Ok(fs::read(self.root.join(name))?)
    }

    fn write_table(&mut self, name: &str, data: &[u8]) -> StoreResult<()> {
        check_name(name)?;
        replace_file(&self.root.join(name), data)?;
        debug!("store: {} written, {} bytes", name, data.len());
        Ok(())
    }
}
