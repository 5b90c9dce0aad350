//! Layout descriptors for message-passing datatypes.
//!
//! This crate is the read-only data model consumed by the pack/unpack
//! engine: a [`Datatype`] is a tree of [`LayoutNode`]s over one
//! [`BasicType`], with its extent, bounds and contiguity computed once at
//! construction.
//!
//! # Core Types
//!
//! - [`BasicType`]: the closed set of indivisible element kinds
//! - [`Datatype`] / [`LayoutNode`]: a nested layout, strides and
//!   displacements stored in element units
//! - [`Kind`] / [`Shape`]: the parameter-free nesting sequence of a layout
//! - [`BlockLengthMode`]: fixed or runtime block length of the innermost level
//!
//! [`Datatype::flatten`] and [`Datatype::unflatten`] turn a layout into a
//! self-contained byte image and back.
//!
//! # Example
//!
//! ```rust
//! use pup_layout::{BasicType, Datatype, Kind};
//!
//! let int = Datatype::basic(BasicType::Int32);
//! // 3 blocks of 2 ints, 5 ints apart
//! let vector = Datatype::vector(3, 2, 5, &int).unwrap();
//! assert_eq!(vector.num_elements(), 6);
//! assert_eq!(vector.extent(), 12);
//! assert_eq!(vector.shape().kinds(), &[Kind::StridedBlock]);
//! ```

mod basic;
mod datatype;
mod flatten;
mod shape;

pub use basic::BasicType;
pub use datatype::{Datatype, LayoutNode};
pub use shape::{BlockLengthMode, Kind, Shape, FIXED_BLOCKLENGTHS};

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while describing layouts or moving data through them.
#[derive(Debug, thiserror::Error)]
pub enum PupError {
    /// Shape enumeration was asked for a negative nesting depth.
    #[error("maximum nesting depth must be non-negative, got {0}")]
    NegativeDepth(isize),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No kernel exists for this basic type (or operation on it).
    #[error("unsupported basic type: {0}")]
    UnsupportedType(BasicType),

    /// No kernel is registered under this identity.
    #[error("no kernel registered for {0}")]
    UnsupportedShape(String),

    /// A buffer cannot hold the elements the operation touches.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    /// A reduction was requested on a type without arithmetic.
    #[error("reduction requested on non-arithmetic type {0}")]
    NotArithmetic(BasicType),

    /// The layout touches an offset before the start of the buffer.
    #[error("layout touches negative element offset {0}")]
    NegativeOffset(isize),

    /// A byte buffer is not aligned for the basic type's storage.
    #[error("buffer is not aligned for {0}")]
    Misaligned(BasicType),

    /// A byte quantity is not a whole number of basic elements.
    #[error("{what} of {value} bytes is not a multiple of the {elem_size}-byte element")]
    Unaligned {
        what: &'static str,
        value: isize,
        elem_size: usize,
    },

    /// A per-block array disagrees with the declared block count.
    #[error("{what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A kernel handle was invoked with a datatype it was not selected for.
    #[error("kernel {kernel} cannot serve a datatype of shape {shape}")]
    KernelMismatch { kernel: String, shape: String },

    /// Integer overflow while computing an offset or size.
    #[error("offset overflow while computing layout")]
    OffsetOverflow,

    /// A flattened datatype image could not be encoded or decoded.
    #[error("datatype image: {0}")]
    Flatten(String),

    /// Failure reported by an alternate (e.g. accelerated) backend.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Coarse classification of [`PupError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Invalid enumeration or dispatch parameters.
    Configuration,
    /// Basic type or shape not registered with the dispatcher.
    UnsupportedType,
    /// A caller-detectable precondition was violated.
    CallerContract,
    /// Backend-specific fault.
    Backend,
}

impl PupError {
    /// The taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            PupError::NegativeDepth(_) | PupError::InvalidConfig(_) => ErrorClass::Configuration,
            PupError::UnsupportedType(_) | PupError::UnsupportedShape(_) => {
                ErrorClass::UnsupportedType
            }
            PupError::Backend(_) => ErrorClass::Backend,
            PupError::BufferTooSmall { .. }
            | PupError::NotArithmetic(_)
            | PupError::NegativeOffset(_)
            | PupError::Misaligned(_)
            | PupError::Unaligned { .. }
            | PupError::LengthMismatch { .. }
            | PupError::KernelMismatch { .. }
            | PupError::OffsetOverflow
            | PupError::Flatten(_) => ErrorClass::CallerContract,
        }
    }
}

/// Result type for layout and pack/unpack operations.
pub type Result<T> = std::result::Result<T, PupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class() {
        assert_eq!(PupError::NegativeDepth(-1).class(), ErrorClass::Configuration);
        assert_eq!(
            PupError::UnsupportedType(BasicType::LongDouble).class(),
            ErrorClass::UnsupportedType
        );
        assert_eq!(
            PupError::BufferTooSmall { needed: 8, got: 4 }.class(),
            ErrorClass::CallerContract
        );
        assert_eq!(PupError::Backend("x".into()).class(), ErrorClass::Backend);
        assert_eq!(
            PupError::Flatten("eof".into()).class(),
            ErrorClass::CallerContract
        );
    }

    #[test]
    fn test_error_display() {
        let err = PupError::Unaligned {
            what: "stride",
            value: 6,
            elem_size: 4,
        };
        assert_eq!(
            err.to_string(),
            "stride of 6 bytes is not a multiple of the 4-byte element"
        );
    }
}
