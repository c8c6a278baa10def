/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Macros shared by the 8-bit [::bitflags] types of key events and key map rows.
#[doc(hidden)]
pub use bitflags;

/// Adds the byte conversions of a `u8` backed [::bitflags] type.
///
/// Creates `const fn from_data(u8) -> Self`, dropping undefined bits without the
/// cost of `from_bits_truncate()`, and `From` implementations in both directions
/// so the type can be (de)serialized as a plain byte.
#[macro_export]
macro_rules! byte_flags {
    ($flags:ident) => {
        impl $flags {
            /// Creates flags from raw bits in `data`, ignoring the undefined ones.
            #[inline]
            pub const fn from_data(data: u8) -> Self {
                $flags::from_bits_retain(data & $flags::all().bits())
            }
        }

        impl From<u8> for $flags {
            #[inline]
            fn from(data: u8) -> Self {
                $flags::from_data(data)
            }
        }

        impl From<$flags> for u8 {
            #[inline]
            fn from(flags: $flags) -> u8 {
                flags.bits()
            }
        }
    };
}

/// Declares constants grouping several flags of a [::bitflags] type.
///
/// The groups are ordinary associated constants, so they are not listed
/// among the named flags and don't show up in the `Debug` output.
#[macro_export]
macro_rules! flag_groups {
    ($flags:ident { $($(#[$meta:meta])* pub const $group:ident = $($flag:ident)|+;)* }) => {
        impl $flags {$(
            $(#[$meta])*
            pub const $group: Self = $flags::from_bits_retain(0 $(| $flags::$flag.bits())+);
        )*}
    };
}

/// Asserts that a [::bitflags] type names exactly `$count` distinct single bit flags
/// occupying the lowest `$count` bits, in ascending order.
#[macro_export]
macro_rules! assert_single_bit_flags {
    ($flags:ty, $count:expr) => {{
        use $crate::flags::bitflags::Flags;
        let named = <$flags as Flags>::FLAGS;
        assert_eq!(named.len(), $count, "number of named flags");
        let mut seen = 0u32;
        for flag in named.iter() {
            let bits = u32::from(flag.value().bits());
            assert_eq!(bits.count_ones(), 1, "{} is not a single bit", flag.name());
            assert!(bits > seen, "{} is out of order", flag.name());
            seen |= bits;
        }
        assert_eq!(seen, (1u32 << $count) - 1);
        assert_eq!(u32::from(<$flags>::all().bits()), seen);
    }};
}
