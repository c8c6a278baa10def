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
//! Host keyboard port emulators of the SHARPKEY library.
//!
//! * [mz] - the Sharp MZ-2500/MZ-2800 15×8 scanned key matrix.
//! * [pc98] - the NEC PC-9801 serial keyboard (19200 baud, odd parity).
//!
//! Each host is split into an acquisition side (a keyboard: scan codes in, output state out)
//! and a real-time driver serving the host link from a shared output state.
pub mod mz;
pub mod pc98;
