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
//! The core components of the SHARPKEY library.
//!
//! This crate defines the host-agnostic half of a keyboard interface: scan codes as delivered by
//! the PS/2 or Bluetooth acquisition layer, the table-driven [key mapping engine][engine], the
//! persistent [configuration][config] and the coordination primitives shared between the
//! acquisition loop and a real-time host driver.
//!
//! The host protocol emulators live in the `sharpkey-hosts` crate.
pub mod config;
pub mod engine;
pub mod flags;
pub mod keymap;
pub mod scancode;
pub mod source;
pub mod status;
pub mod store;
pub mod sync;

pub use engine::{KeyMapping, KeyMapPersistence};
