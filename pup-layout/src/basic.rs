//! The closed set of basic element types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An indivisible element kind with a fixed byte size.
///
/// Sizes follow the LP64 C ABI (`wchar_t` is 4 bytes, `long double` is
/// stored in 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BasicType {
    Bool,
    Char,
    WChar,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
}

impl BasicType {
    /// Every basic type, in declaration order.
    pub const ALL: [BasicType; 12] = [
        BasicType::Bool,
        BasicType::Char,
        BasicType::WChar,
        BasicType::Int8,
        BasicType::Int16,
        BasicType::Int32,
        BasicType::Int64,
        BasicType::Float,
        BasicType::Double,
        BasicType::LongDouble,
        BasicType::ComplexFloat,
        BasicType::ComplexDouble,
    ];

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            BasicType::Bool | BasicType::Char | BasicType::Int8 => 1,
            BasicType::Int16 => 2,
            BasicType::WChar | BasicType::Int32 | BasicType::Float => 4,
            BasicType::Int64 | BasicType::Double | BasicType::ComplexFloat => 8,
            BasicType::LongDouble | BasicType::ComplexDouble => 16,
        }
    }

    /// Whether element-wise arithmetic is meaningful for this type.
    pub const fn is_arithmetic(self) -> bool {
        !matches!(self, BasicType::Bool)
    }

    /// C spelling, used in kernel identities.
    pub const fn name(self) -> &'static str {
        match self {
            BasicType::Bool => "_Bool",
            BasicType::Char => "char",
            BasicType::WChar => "wchar_t",
            BasicType::Int8 => "int8_t",
            BasicType::Int16 => "int16_t",
            BasicType::Int32 => "int32_t",
            BasicType::Int64 => "int64_t",
            BasicType::Float => "float",
            BasicType::Double => "double",
            BasicType::LongDouble => "long_double",
            BasicType::ComplexFloat => "c_complex",
            BasicType::ComplexDouble => "c_double_complex",
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
