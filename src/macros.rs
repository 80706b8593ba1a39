//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields that use
//! little-endian wrapper types (U16, U32). Jet stores every multi-byte header
//! field little-endian, so page headers are declared with these wrappers and
//! exposed through native integers.
//!
//! ```ignore
//! use zerocopy::little_endian::{U16, U32};
//!
//! #[repr(C)]
//! struct Header {
//!     free_space: U16,
//!     next_page: U32,
//! }
//!
//! impl Header {
//!     zerocopy_accessors! {
//!         free_space: u16,
//!         next_page: u32,
//!     }
//! }
//!
//! // Generates:
//! // pub fn free_space(&self) -> u16 { self.free_space.get() }
//! // pub fn set_free_space(&mut self, val: u16) { self.free_space = U16::new(val); }
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u16) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u16 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u16) {
                self.$field = ::zerocopy::little_endian::U16::new(val);
            }
        }
    };
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
