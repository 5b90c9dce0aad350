//! Rust representations of basic types.
//!
//! Pack and unpack only move bits, so every basic type runs on a storage
//! class of matching size and alignment. Reductions need real arithmetic and
//! map to a distinct reduction type per basic type.

use pup_layout::BasicType;

/// Bit-copyable representation used by pack and unpack kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    U8,
    U16,
    U32,
    U64,
    /// Two 4-byte words (`float _Complex`).
    U32x2,
    /// Two 8-byte words (`double _Complex`, `long double`).
    U64x2,
}

impl Storage {
    pub const fn of(basic: BasicType) -> Storage {
        match basic {
            BasicType::Bool | BasicType::Char | BasicType::Int8 => Storage::U8,
            BasicType::Int16 => Storage::U16,
            BasicType::WChar | BasicType::Int32 | BasicType::Float => Storage::U32,
            BasicType::Int64 | BasicType::Double => Storage::U64,
            BasicType::ComplexFloat => Storage::U32x2,
            BasicType::ComplexDouble | BasicType::LongDouble => Storage::U64x2,
        }
    }

    /// Required buffer alignment in bytes.
    pub const fn align(self) -> usize {
        match self {
            Storage::U8 => 1,
            Storage::U16 => 2,
            Storage::U32 | Storage::U32x2 => 4,
            Storage::U64 | Storage::U64x2 => 8,
        }
    }
}

/// Whether accumulate-unpack has a Rust arithmetic type for `basic`.
///
/// `_Bool` has no arithmetic and `long double` has no portable Rust
/// counterpart.
pub const fn is_reducible(basic: BasicType) -> bool {
    basic.is_arithmetic() && !matches!(basic, BasicType::LongDouble)
}

/// Whether both buffers satisfy the alignment of `basic`'s storage.
pub fn is_aligned(basic: BasicType, a: &[u8], b: &[u8]) -> bool {
    let align = Storage::of(basic).align();
    a.as_ptr().align_offset(align) == 0 && b.as_ptr().align_offset(align) == 0
}
