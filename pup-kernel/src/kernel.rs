//! Specialized pack/unpack/accumulate kernels.
//!
//! The typed kernels walk a [`Nest`] over typed slices. The byte wrappers
//! give every kernel the same [`KernelFn`] signature so they can live in one
//! table regardless of element type or shape.

use pup_layout::{BasicType, Datatype, PupError, Result};
use pup_traits::{Element, ReduceOp, Reducible};

use crate::nest::Nest;
use crate::Operation;

/// Uniform kernel entry point: `(operation, src, dst, count, datatype)`.
///
/// Buffers are sized and checked by the caller.
pub type KernelFn = fn(Operation, &[u8], &mut [u8], usize, &Datatype) -> Result<()>;

// ============================================================================
// Typed kernels
// ============================================================================

/// Gather `count` instances of `dt` from `src` into `dst`.
#[inline]
pub(crate) fn pack<T: Element, N: Nest>(src: &[T], dst: &mut [T], count: usize, dt: &Datatype) {
    let extent = dt.extent() as isize;
    let mut idx = 0usize;
    for i in 0..count {
        N::visit(dt, i as isize * extent, &mut |off| {
            dst[idx] = src[off as usize];
            idx += 1;
        });
    }
}

/// Scatter `count` packed instances of `dt` from `src` into `dst`.
#[inline]
pub(crate) fn unpack<T: Element, N: Nest>(src: &[T], dst: &mut [T], count: usize, dt: &Datatype) {
    let extent = dt.extent() as isize;
    let mut idx = 0usize;
    for i in 0..count {
        N::visit(dt, i as isize * extent, &mut |off| {
            dst[off as usize] = src[idx];
            idx += 1;
        });
    }
}

/// Scatter with `op`, combining into the existing contents of `dst`.
#[inline]
pub(crate) fn acc_unpack<T: Reducible, N: Nest>(
    src: &[T],
    dst: &mut [T],
    count: usize,
    dt: &Datatype,
    op: ReduceOp,
) {
    let extent = dt.extent() as isize;
    let mut idx = 0usize;
    for i in 0..count {
        N::visit(dt, i as isize * extent, &mut |off| {
            let slot = &mut dst[off as usize];
            *slot = slot.reduce(src[idx], op);
            idx += 1;
        });
    }
}

// ============================================================================
// Byte wrappers
// ============================================================================

fn cast<T: Element>(bytes: &[u8], basic: BasicType) -> Result<&[T]> {
    bytemuck::try_cast_slice(bytes).map_err(|_| PupError::Misaligned(basic))
}

fn cast_mut<T: Element>(bytes: &mut [u8], basic: BasicType) -> Result<&mut [T]> {
    bytemuck::try_cast_slice_mut(bytes).map_err(|_| PupError::Misaligned(basic))
}

pub(crate) fn pack_bytes<T: Element, N: Nest>(
    _op: Operation,
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
) -> Result<()> {
    let basic = dt.basic_type();
    pack::<T, N>(cast(src, basic)?, cast_mut(dst, basic)?, count, dt);
    Ok(())
}

pub(crate) fn unpack_bytes<T: Element, N: Nest>(
    _op: Operation,
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
) -> Result<()> {
    let basic = dt.basic_type();
    unpack::<T, N>(cast(src, basic)?, cast_mut(dst, basic)?, count, dt);
    Ok(())
}

pub(crate) fn acc_unpack_bytes<T: Reducible, N: Nest>(
    op: Operation,
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
) -> Result<()> {
    let Operation::AccumulateUnpack(reduce) = op else {
        return Err(PupError::KernelMismatch {
            kernel: format!("acc_unpack_{}_{}", N::shape(), dt.basic_type()),
            shape: op.to_string(),
        });
    };
    let basic = dt.basic_type();
    acc_unpack::<T, N>(cast(src, basic)?, cast_mut(dst, basic)?, count, dt, reduce);
    Ok(())
}
