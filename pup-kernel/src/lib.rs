//! Shape enumeration, offset formulas and pack/unpack kernels for nested
//! datatypes.
//!
//! This crate sits between `pup-layout` (descriptors) and the `strided-pup`
//! frontend:
//!
//! ```text
//! pup-traits -> pup-layout -> pup-kernel -> strided-pup
//! ```
//!
//! - [`enumerate`]: which shapes get a specialized kernel
//! - [`formula`]: closed-form element offsets, one term per level
//! - [`nest`]: compile-time nests the specialized kernels walk
//! - [`registry`]: the process-wide kernel table
//! - [`dispatch`]: mapping a concrete datatype to a kernel, or to the
//!   depth-unbounded fallback evaluator

pub mod dispatch;
pub mod enumerate;
pub mod formula;
mod generic;
mod kernel;
pub mod nest;
mod op;
pub mod registry;
pub mod storage;

pub use dispatch::{DispatchConfig, Dispatcher, HandleKind, KernelHandle};
pub use enumerate::{eligible_keys, enumerate_shapes, enumerate_variants, is_eligible, Shapes};
pub use formula::{Formula, LevelIndex, LevelTerm};
pub use kernel::KernelFn;
pub use op::Operation;
pub use registry::{KernelKey, KernelTable, SPECIALIZED_MAX_DEPTH};
