//! # Jet Format Constants
//!
//! This module centralizes the numeric constants of the Jet4 (Access 2000+)
//! on-disk format that the index subsystem depends on. Constants that depend
//! on each other are co-located and their relationships are enforced through
//! compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> INDEX_ENTRY_MASK_OFFSET (27, fixed by the format)
//!       │     │
//!       │     └─> INDEX_ENTRY_MASK_SIZE (453 bytes = 3624 addressable bits)
//!       │           │
//!       │           └─> INDEX_ENTRIES_OFFSET (derived: 27 + 453 = 480)
//!       │
//!       └─> INDEX_DATA_CAPACITY (derived: PAGE_SIZE - INDEX_ENTRIES_OFFSET)
//!             Every end offset (0..=capacity) needs a bit in the entry mask.
//!
//! ROW_ID_PAGE_BYTES (3) + ROW_ID_ROW_BYTES (1)
//!       │
//!       └─> ROW_ID_SIZE (4, trailing bytes of every leaf entry)
//!             Node entries add CHILD_PAGE_SIZE (4) more.
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use jetdb::config::{PAGE_SIZE, INDEX_ENTRIES_OFFSET};
//! ```

// ============================================================================
// PAGE LAYOUT
// ============================================================================

/// Size of a Jet4 database page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Smallest page size accepted by `JetFormat::with_page_size`. Smaller pages
/// are only useful in tests that want to force splits with few entries.
pub const MIN_PAGE_SIZE: usize = 512;

// ============================================================================
// INDEX PAGE HEADER
// Offsets of the fields shared by index node and leaf pages
// ============================================================================

pub const INDEX_PAGE_TYPE_OFFSET: usize = 0;
pub const INDEX_PAGE_MARKER_OFFSET: usize = 1;
pub const INDEX_FREE_SPACE_OFFSET: usize = 2;
pub const INDEX_OWNER_PAGE_OFFSET: usize = 4;
pub const INDEX_PREV_PAGE_OFFSET: usize = 12;
pub const INDEX_NEXT_PAGE_OFFSET: usize = 16;
pub const INDEX_CHILD_TAIL_PAGE_OFFSET: usize = 20;
pub const INDEX_PREFIX_LEN_OFFSET: usize = 24;

/// Marker byte written right after the page type on every index page.
pub const INDEX_PAGE_MARKER: u8 = 0x01;

pub const INDEX_ENTRY_MASK_OFFSET: usize = 27;
pub const INDEX_ENTRY_MASK_SIZE: usize = 453;

/// First byte of entry data.
pub const INDEX_ENTRIES_OFFSET: usize = INDEX_ENTRY_MASK_OFFSET + INDEX_ENTRY_MASK_SIZE;

/// Bytes available to entries on a standard page.
pub const INDEX_DATA_CAPACITY: usize = PAGE_SIZE - INDEX_ENTRIES_OFFSET;

const _: () = assert!(
    INDEX_ENTRIES_OFFSET == 480,
    "INDEX_ENTRIES_OFFSET must match the Jet4 layout"
);

const _: () = assert!(
    INDEX_DATA_CAPACITY < INDEX_ENTRY_MASK_SIZE * 8,
    "entry mask must address every entry end offset of an index page"
);

const _: () = assert!(
    MIN_PAGE_SIZE > INDEX_ENTRIES_OFFSET,
    "MIN_PAGE_SIZE must leave room for entries"
);

// ============================================================================
// ENTRY LAYOUT
// ============================================================================

pub const ROW_ID_PAGE_BYTES: usize = 3;
pub const ROW_ID_ROW_BYTES: usize = 1;
pub const ROW_ID_SIZE: usize = ROW_ID_PAGE_BYTES + ROW_ID_ROW_BYTES;

/// Largest page number a row id can reference (24 bits).
pub const MAX_ROW_ID_PAGE: u32 = (1 << (ROW_ID_PAGE_BYTES * 8)) - 1;

/// Trailing child pointer of node entries.
pub const CHILD_PAGE_SIZE: usize = 4;

/// Text values are truncated to this many characters before encoding.
pub const MAX_TEXT_INDEX_CHARS: usize = 255;

/// Maximum number of columns in one index.
pub const MAX_INDEX_COLUMNS: usize = 10;

// ============================================================================
// COLUMN FLAGS
// Leading byte of every encoded column value
// ============================================================================

pub const ASC_START_FLAG: u8 = 0x7F;
pub const ASC_NULL_FLAG: u8 = 0x00;
pub const DESC_START_FLAG: u8 = 0x80;
pub const DESC_NULL_FLAG: u8 = 0xFF;

pub const ASC_BOOLEAN_TRUE: u8 = 0x00;
pub const ASC_BOOLEAN_FALSE: u8 = 0xFF;

/// Terminates the primary codes and the accent codes of an encoded text
/// value.
pub const END_TEXT: u8 = 0x01;

/// General sort order weights. Control characters share the lowest weight,
/// punctuation sorts before digits, digits before letters, and characters
/// outside the Latin tables take a three-byte code after every letter.
pub const TEXT_CONTROL_WEIGHT: u8 = 0x02;
pub const TEXT_SYMBOL_BASE: u8 = 0x03;
pub const TEXT_DIGIT_BASE: u8 = 0x30;
pub const TEXT_LETTER_BASE: u8 = 0x40;
pub const TEXT_WIDE_BASE: u8 = 0x60;

/// Accent weight of an unaccented character. Accent codes are trimmed of
/// trailing unaccented weights, so plain text stores an empty accent run.
pub const TEXT_NO_ACCENT: u8 = 0x02;

const _: () = assert!(TEXT_SYMBOL_BASE as usize + 34 < TEXT_DIGIT_BASE as usize);
const _: () = assert!(TEXT_LETTER_BASE as usize + 26 < TEXT_WIDE_BASE as usize);
const _: () = assert!(TEXT_NO_ACCENT > END_TEXT);

/// Binary values are written in chunks of this size, each followed by a
/// length marker.
pub const BINARY_CHUNK_SIZE: usize = 8;
pub const BINARY_CHUNK_MORE: u8 = 9;

// ============================================================================
// B-TREE LIMITS
// ============================================================================

/// Descent path capacity kept on the stack.
pub const MAX_TREE_DEPTH: usize = 8;

/// Money values are stored as integers scaled by 10^4.
pub const MONEY_SCALE: u32 = 4;

/// Decimal columns store at most this many digits.
pub const MAX_NUMERIC_PRECISION: u8 = 28;
