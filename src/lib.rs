//! Pack, unpack and accumulate-unpack for nested message-passing datatypes.
//!
//! A [`Datatype`] describes where the elements of one message instance live
//! in a (possibly non-contiguous) buffer. This crate moves `count` such
//! instances between that described buffer and a contiguous packed buffer,
//! picking a kernel specialized for the datatype's nesting shape when one
//! exists and a generic tree walker otherwise.
//!
//! # Core Types
//!
//! - [`Datatype`] / [`BasicType`]: layout descriptors (from `pup-layout`)
//! - [`Engine`]: frontend bound to a [`DispatchConfig`]
//! - [`Dispatcher`] / [`KernelHandle`]: kernel selection (from `pup-kernel`)
//!
//! # Primary API
//!
//! - [`pack`] / [`unpack`]: whole-message transfers
//! - [`acc_unpack`]: unpack that combines into the destination ([`ReduceOp::Sum`])
//! - [`pack_segment`] / [`unpack_segment`] / [`acc_unpack_segment`]: byte
//!   windows of the packed stream
//! - [`iov`] / [`iov_len`] / [`iov_range`]: contiguous runs of a described
//!   layout, whole or in bounded batches
//! - [`Datatype::flatten`] / [`Datatype::unflatten`]: portable byte images of
//!   a layout
//!
//! # Example
//!
//! ```rust
//! use strided_pup::{pack, BasicType, Datatype};
//!
//! let int = Datatype::basic(BasicType::Int32);
//! // 3 blocks of 2 ints, 5 ints apart
//! let dt = Datatype::vector(3, 2, 5, &int).unwrap();
//!
//! let src: Vec<i32> = (0..30).collect();
//! let mut packed = vec![0i32; 6];
//! let written = pack(
//!     bytemuck::cast_slice(&src),
//!     1,
//!     &dt,
//!     bytemuck::cast_slice_mut(&mut packed),
//! )
//! .unwrap();
//! assert_eq!(written, 24);
//! assert_eq!(packed, [0, 1, 5, 6, 10, 11]);
//! ```
//!
//! # Configuration
//!
//! Shapes up to [`SPECIALIZED_MAX_DEPTH`] levels (2, or 3 with the
//! `nesting-3` feature) have compiled kernels. [`Engine::from_env`] reads
//! `STRIDED_PUP_MAX_NESTING` to lower that cutoff and `STRIDED_PUP_NO_BLKLEN=1`
//! to disable fixed block length kernels.

mod iov;
mod ops;
mod segment;

pub use iov::{iov, iov_len, iov_range, IovEntry};
pub use ops::{acc_unpack, pack, unpack, Engine};
pub use segment::{acc_unpack_segment, pack_segment, unpack_segment};

// ============================================================================
// Re-exports
// ============================================================================
pub use pup_kernel::{
    DispatchConfig, Dispatcher, HandleKind, KernelHandle, KernelKey, Operation,
    SPECIALIZED_MAX_DEPTH,
};
pub use pup_layout::{
    BasicType, BlockLengthMode, Datatype, ErrorClass, Kind, LayoutNode, PupError, Result, Shape,
};
pub use pup_traits::{PodComplexF32, PodComplexF64, ReduceOp, Reducible};
