/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    SHARPKEY is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    SHARPKEY is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! SHARPKEY is a library for building PS/2 and Bluetooth keyboard interfaces for vintage
//! computers.
//!
//! A keyboard interface consists of two cooperating parts:
//!
//! * The acquisition loop reads [scan codes][scancode::ScanCode] from a keyboard, maps them
//!   with the [key mapping engine][engine] and updates the emulated host output state.
//! * The real-time driver serves the host from that output state alone, yielding or suspending
//!   when the acquisition loop needs quiet time, e.g. to write the [persistent store][store].
//!
//! Supported hosts:
//!
//! * [mz] - the Sharp MZ-2500/MZ-2800 scanned key matrix,
//! * [pc98] - the NEC PC-9801 serial keyboard.
//!
//! The key mapping tables, the configuration record and the option select sequence
//! (`Ctrl`+`Shift`+`Esc` followed by a command key) are common to all hosts.
pub use sharpkey_core::{config, engine, flags, keymap, scancode, source, status, store, sync};
pub use sharpkey_core::{KeyMapping, KeyMapPersistence};
pub use sharpkey_hosts::{mz, pc98};
