//! Shape enumeration.
//!
//! Every non-empty sequence over a kind alphabet up to a maximum depth is a
//! candidate for a specialized kernel. Sequences come out shortest first and
//! lexicographically (by alphabet position) within one depth, so the outermost
//! kind varies slowest.

use pup_layout::{BasicType, BlockLengthMode, Kind, PupError, Result, Shape, FIXED_BLOCKLENGTHS};
use smallvec::SmallVec;

use crate::{KernelKey, Operation};

/// Lazy iterator over all shapes of length `1..=max_depth`.
///
/// Created by [`enumerate_shapes`].
#[derive(Debug, Clone)]
pub struct Shapes<'a> {
    kinds: &'a [Kind],
    max_depth: usize,
    // Alphabet position of each level; `None` once exhausted.
    digits: Option<SmallVec<[usize; 4]>>,
}

impl Iterator for Shapes<'_> {
    type Item = Shape;

    fn next(&mut self) -> Option<Shape> {
        let digits = self.digits.as_mut()?;
        let shape: Shape = digits.iter().map(|&d| self.kinds[d]).collect();

        // Odometer increment, innermost level fastest.
        let mut level = digits.len();
        loop {
            if level == 0 {
                let depth = digits.len() + 1;
                if depth > self.max_depth {
                    self.digits = None;
                } else {
                    digits.clear();
                    digits.resize(depth, 0);
                }
                break;
            }
            level -= 1;
            digits[level] += 1;
            if digits[level] < self.kinds.len() {
                break;
            }
            digits[level] = 0;
        }
        Some(shape)
    }
}

/// Enumerate every ordered kind sequence of length `1..=max_depth` over
/// `kinds`, repetition allowed.
///
/// Yields `sum(k^d for d in 1..=max_depth)` shapes for `k` kinds. A negative
/// depth is a configuration error; depth 0 yields nothing.
pub fn enumerate_shapes(kinds: &[Kind], max_depth: isize) -> Result<Shapes<'_>> {
    if max_depth < 0 {
        return Err(PupError::NegativeDepth(max_depth));
    }
    let max_depth = max_depth as usize;
    let digits = (!kinds.is_empty() && max_depth > 0).then(|| SmallVec::from_elem(0, 1));
    Ok(Shapes {
        kinds,
        max_depth,
        digits,
    })
}

/// Whether a kernel for `shape` under `mode` can ever be selected.
pub fn is_eligible(shape: &Shape, mode: BlockLengthMode) -> bool {
    match mode {
        BlockLengthMode::Generic => true,
        BlockLengthMode::Fixed(n) => {
            shape.admits_fixed_blocklength() && FIXED_BLOCKLENGTHS.contains(&n)
        }
    }
}

/// Every eligible `(shape, mode)` pair, fixed block lengths taken from
/// `fixed`.
pub fn enumerate_variants<'a>(
    kinds: &'a [Kind],
    max_depth: isize,
    fixed: &'a [usize],
) -> Result<impl Iterator<Item = (Shape, BlockLengthMode)> + 'a> {
    let shapes = enumerate_shapes(kinds, max_depth)?;
    Ok(shapes.flat_map(move |shape| {
        fixed
            .iter()
            .map(|&n| BlockLengthMode::Fixed(n))
            .chain(std::iter::once(BlockLengthMode::Generic))
            .filter(|&mode| is_eligible(&shape, mode))
            .map(|mode| (shape.clone(), mode))
            .collect::<Vec<_>>()
    }))
}

/// Every kernel identity a complete table must hold for composite shapes.
pub fn eligible_keys<'a>(
    kinds: &'a [Kind],
    max_depth: isize,
    fixed: &'a [usize],
    basics: &'a [BasicType],
    operations: &'a [Operation],
) -> Result<impl Iterator<Item = KernelKey> + 'a> {
    let variants = enumerate_variants(kinds, max_depth, fixed)?;
    Ok(variants.flat_map(move |(shape, mode)| {
        let mut keys = Vec::new();
        for &basic in basics {
            for &operation in operations {
                if operation.is_defined_for(basic) {
                    keys.push(KernelKey::new(shape.clone(), mode, basic, operation));
                }
            }
        }
        keys
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_traits::ReduceOp;

    #[test]
    fn test_negative_depth() {
        assert!(matches!(
            enumerate_shapes(&Kind::ALL, -1),
            Err(PupError::NegativeDepth(-1))
        ));
    }

    #[test]
    fn test_depth_zero_is_empty() {
        assert_eq!(enumerate_shapes(&Kind::ALL, 0).unwrap().count(), 0);
        assert_eq!(enumerate_shapes(&[], 3).unwrap().count(), 0);
    }

    #[test]
    fn test_counts() {
        assert_eq!(enumerate_shapes(&Kind::ALL, 1).unwrap().count(), 5);
        assert_eq!(enumerate_shapes(&Kind::ALL, 2).unwrap().count(), 30);
        assert_eq!(enumerate_shapes(&Kind::ALL, 3).unwrap().count(), 155);
    }

    #[test]
    fn test_order() {
        let kinds = [Kind::Contiguous, Kind::Resized];
        let shapes: Vec<String> = enumerate_shapes(&kinds, 2)
            .unwrap()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            shapes,
            [
                "contig",
                "resized",
                "contig_contig",
                "contig_resized",
                "resized_contig",
                "resized_resized"
            ]
        );
    }

    #[test]
    fn test_eligibility() {
        let blocked = Shape::from_kinds(&[Kind::Contiguous, Kind::StridedBlock]);
        let indexed = Shape::from_kinds(&[Kind::StridedBlock, Kind::VariableIndexed]);
        assert!(is_eligible(&blocked, BlockLengthMode::Fixed(8)));
        assert!(!is_eligible(&blocked, BlockLengthMode::Fixed(9)));
        assert!(!is_eligible(&indexed, BlockLengthMode::Fixed(1)));
        assert!(is_eligible(&indexed, BlockLengthMode::Generic));
    }

    #[test]
    fn test_variant_counts() {
        // depth 1: hvector and blkhindx get 8 fixed + generic, others generic
        let d1 = enumerate_variants(&Kind::ALL, 1, &FIXED_BLOCKLENGTHS)
            .unwrap()
            .count();
        assert_eq!(d1, 21);
        let d2 = enumerate_variants(&Kind::ALL, 2, &FIXED_BLOCKLENGTHS)
            .unwrap()
            .count();
        assert_eq!(d2, 21 + 5 * 21);
    }

    #[test]
    fn test_eligible_keys_skip_undefined() {
        let keys: Vec<KernelKey> = eligible_keys(
            &[Kind::Contiguous],
            1,
            &[],
            &[BasicType::Bool, BasicType::Int32],
            &Operation::ALL,
        )
        .unwrap()
        .collect();
        // Bool has no accumulate kernel
        assert_eq!(keys.len(), 5);
        assert!(!keys.iter().any(|k| k.basic() == BasicType::Bool
            && k.operation() == Operation::AccumulateUnpack(ReduceOp::Sum)));
    }
}
