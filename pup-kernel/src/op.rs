//! Kernel operations.

use std::fmt;

use pup_layout::BasicType;
use pup_traits::ReduceOp;

use crate::storage;

/// Direction of a data movement between a described and a packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Gather from the described layout into a packed buffer.
    Pack,
    /// Scatter from a packed buffer into the described layout.
    Unpack,
    /// Scatter, combining with the existing destination value.
    AccumulateUnpack(ReduceOp),
}

impl Operation {
    /// Every operation, reductions expanded.
    pub const ALL: [Operation; 3] = [
        Operation::Pack,
        Operation::Unpack,
        Operation::AccumulateUnpack(ReduceOp::Sum),
    ];

    /// Whether a kernel for this operation can exist on `basic`.
    pub fn is_defined_for(self, basic: BasicType) -> bool {
        match self {
            Operation::Pack | Operation::Unpack => true,
            Operation::AccumulateUnpack(_) => storage::is_reducible(basic),
        }
    }

    /// Whether the packed buffer is the source.
    pub fn reads_packed(self) -> bool {
        !matches!(self, Operation::Pack)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Pack => f.write_str("pack"),
            Operation::Unpack => f.write_str("unpack"),
            Operation::AccumulateUnpack(op) => write!(f, "acc_unpack_{op}"),
        }
    }
}
