//! Depth-unbounded evaluator.
//!
//! Follows the [`Formula`] of the layout at every level instead of relying
//! on a compiled nest, so it serves any depth. Elements are moved as byte
//! chunks, which also makes it the path for buffers too poorly aligned for
//! the specialized kernels.

use bytemuck::{bytes_of, pod_read_unaligned};
use pup_layout::{BasicType, Datatype, PupError, Result};
use pup_traits::{PodComplexF32, PodComplexF64, ReduceOp, Reducible};

use crate::formula::Formula;
use crate::Operation;

fn for_each_offset<F: FnMut(isize)>(dt: &Datatype, count: usize, f: F) {
    Formula::build(dt).for_each_offset(count, f);
}

/// Run `operation` over `count` instances of `dt`.
///
/// `src` and `dst` must already be sized for the operation.
pub(crate) fn evaluate(
    operation: Operation,
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
) -> Result<()> {
    let size = dt.basic_type().size();
    let mut cursor = 0usize;
    match operation {
        Operation::Pack => for_each_offset(dt, count, |off| {
            let at = off as usize * size;
            dst[cursor..cursor + size].copy_from_slice(&src[at..at + size]);
            cursor += size;
        }),
        Operation::Unpack => for_each_offset(dt, count, |off| {
            let at = off as usize * size;
            dst[at..at + size].copy_from_slice(&src[cursor..cursor + size]);
            cursor += size;
        }),
        Operation::AccumulateUnpack(op) => accumulate(op, src, dst, count, dt)?,
    }
    Ok(())
}

type AccumulateFn = fn(ReduceOp, &[u8], &mut [u8], usize, &Datatype);

fn accumulate(op: ReduceOp, src: &[u8], dst: &mut [u8], count: usize, dt: &Datatype) -> Result<()> {
    let run: AccumulateFn = match dt.basic_type() {
        BasicType::Bool => return Err(PupError::NotArithmetic(BasicType::Bool)),
        BasicType::LongDouble => return Err(PupError::UnsupportedType(BasicType::LongDouble)),
        BasicType::Char | BasicType::Int8 => accumulate_as::<i8>,
        BasicType::Int16 => accumulate_as::<i16>,
        BasicType::WChar | BasicType::Int32 => accumulate_as::<i32>,
        BasicType::Int64 => accumulate_as::<i64>,
        BasicType::Float => accumulate_as::<f32>,
        BasicType::Double => accumulate_as::<f64>,
        BasicType::ComplexFloat => accumulate_as::<PodComplexF32>,
        BasicType::ComplexDouble => accumulate_as::<PodComplexF64>,
    };
    run(op, src, dst, count, dt);
    Ok(())
}

fn accumulate_as<T: Reducible>(
    op: ReduceOp,
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
) {
    let size = std::mem::size_of::<T>();
    let mut cursor = 0usize;
    for_each_offset(dt, count, |off| {
        let at = off as usize * size;
        let slot = &mut dst[at..at + size];
        let current: T = pod_read_unaligned(slot);
        let incoming: T = pod_read_unaligned(&src[cursor..cursor + size]);
        slot.copy_from_slice(bytes_of(&current.reduce(incoming, op)));
        cursor += size;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_layout::BasicType;
    use std::sync::Arc;

    fn deep(levels: usize) -> Arc<Datatype> {
        let mut dt = Datatype::basic(BasicType::Int16);
        for level in 0..levels {
            dt = if level % 2 == 0 {
                Datatype::vector(2, 1, 2, &dt).unwrap()
            } else {
                Datatype::contiguous(2, &dt).unwrap()
            };
        }
        dt
    }

    #[test]
    fn test_offsets_of_deep_layout() {
        let dt = deep(5);
        let mut count = 0;
        let mut max = 0;
        for_each_offset(&dt, 1, |o| {
            count += 1;
            max = max.max(o);
        });
        assert_eq!(count, 32);
        assert!((max as usize) < dt.described_len(1).unwrap());
    }

    #[test]
    fn test_unaligned_pack_unpack() {
        let int = Datatype::basic(BasicType::Int32);
        let dt = Datatype::vector(2, 1, 2, &int).unwrap();
        let mut storage = vec![0u8; 1 + 12];
        for (i, b) in storage[1..].iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut packed = vec![0u8; 1 + 8];
        evaluate(Operation::Pack, &storage[1..], &mut packed[1..], 1, &dt).unwrap();
        assert_eq!(&packed[1..], &[0, 1, 2, 3, 8, 9, 10, 11]);

        let mut back = vec![0u8; 12];
        evaluate(Operation::Unpack, &packed[1..], &mut back, 1, &dt).unwrap();
        assert_eq!(&back, &[0, 1, 2, 3, 0, 0, 0, 0, 8, 9, 10, 11]);
    }

    #[test]
    fn test_accumulate_rejects_bool() {
        let dt = Datatype::contiguous(2, &Datatype::basic(BasicType::Bool)).unwrap();
        let err = evaluate(
            Operation::AccumulateUnpack(ReduceOp::Sum),
            &[1, 1],
            &mut [0, 0],
            1,
            &dt,
        )
        .unwrap_err();
        assert!(matches!(err, PupError::NotArithmetic(BasicType::Bool)));
    }

    #[test]
    fn test_accumulate_int16_wraps() {
        let dt = Datatype::contiguous(2, &Datatype::basic(BasicType::Int16)).unwrap();
        let src: Vec<u8> = bytemuck::cast_slice(&[1i16, 5]).to_vec();
        let mut dst: Vec<u8> = bytemuck::cast_slice(&[i16::MAX, -2]).to_vec();
        evaluate(
            Operation::AccumulateUnpack(ReduceOp::Sum),
            &src,
            &mut dst,
            1,
            &dt,
        )
        .unwrap();
        let got: Vec<i16> = dst
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(got, vec![i16::MIN, 3]);
    }
}
