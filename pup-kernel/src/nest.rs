//! Type-level nesting levels.
//!
//! A specialized kernel is a [`Nest`] type such as
//! `Contiguous<StridedBlock<Leaf, Fixed<2>>>`. Each level reads its
//! [`LevelTerm`] from the descriptor and calls into its child type, so the
//! compiler sees the whole loop nest for a shape and can unroll the
//! innermost block when its length is a [`Fixed`] constant.

use std::marker::PhantomData;

use pup_layout::{BlockLengthMode, Datatype, Kind, Shape};

use crate::formula::{LevelIndex, LevelTerm};

/// Block length of a strided or block-indexed level.
pub trait BlockLen: 'static {
    /// Compile-time length, if any.
    const FIXED: Option<usize>;

    /// The length to iterate, given the one stored in the descriptor.
    fn resolve(runtime: usize) -> usize;
}

/// Block length read from the descriptor.
pub struct Generic;

/// Block length fixed at compile time.
pub struct Fixed<const N: usize>;

impl BlockLen for Generic {
    const FIXED: Option<usize> = None;

    #[inline(always)]
    fn resolve(runtime: usize) -> usize {
        runtime
    }
}

impl<const N: usize> BlockLen for Fixed<N> {
    const FIXED: Option<usize> = Some(N);

    #[inline(always)]
    fn resolve(_runtime: usize) -> usize {
        N
    }
}

/// A layout shape known at compile time.
///
/// `visit` must only be called with a descriptor whose shape is
/// [`Nest::shape`]; levels that do not match are skipped.
pub trait Nest: 'static {
    /// Number of composite levels.
    const DEPTH: usize;

    /// Block length mode of the innermost composite level.
    const MODE: BlockLengthMode;

    /// Append this level's kind and those below it.
    fn push_kinds(shape: &mut Shape);

    /// Call `f` with the element offset of every basic element of one
    /// instance of `dt` placed at `base`, in nesting order.
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F);

    fn shape() -> Shape {
        let mut shape = Shape::new();
        Self::push_kinds(&mut shape);
        shape
    }
}

const fn mode_of<C: Nest, B: BlockLen>() -> BlockLengthMode {
    if C::DEPTH > 0 {
        return C::MODE;
    }
    match B::FIXED {
        Some(n) => BlockLengthMode::Fixed(n),
        None => BlockLengthMode::Generic,
    }
}

/// A bare basic element.
pub struct Leaf;

impl Nest for Leaf {
    const DEPTH: usize = 0;
    const MODE: BlockLengthMode = BlockLengthMode::Generic;

    fn push_kinds(_shape: &mut Shape) {}

    #[inline(always)]
    fn visit<F: FnMut(isize)>(_dt: &Datatype, base: isize, f: &mut F) {
        f(base);
    }
}

/// Run one composite level of kind `kind` over `dt`, recursing into `C`.
///
/// Offsets come from [`LevelTerm::contribution`]; `B` only fixes how many
/// `within` indices each block has.
#[inline(always)]
fn visit_level<C: Nest, B: BlockLen, F: FnMut(isize)>(
    kind: Kind,
    dt: &Datatype,
    base: isize,
    f: &mut F,
) {
    let Some((term, child)) = LevelTerm::from_node(dt.node()) else {
        return;
    };
    if term.kind != kind {
        return;
    }
    for block in 0..term.count {
        for within in 0..B::resolve(term.block_len(block)) {
            if let Some(c) = term.contribution(LevelIndex::new(block, within)) {
                C::visit(child, base + c, f);
            }
        }
    }
}

pub struct Contiguous<C>(PhantomData<C>);

impl<C: Nest> Nest for Contiguous<C> {
    const DEPTH: usize = C::DEPTH + 1;
    const MODE: BlockLengthMode = C::MODE;

    fn push_kinds(shape: &mut Shape) {
        shape.push(Kind::Contiguous);
        C::push_kinds(shape);
    }

    #[inline(always)]
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F) {
        visit_level::<C, Generic, F>(Kind::Contiguous, dt, base, f);
    }
}

pub struct StridedBlock<C, B = Generic>(PhantomData<(C, B)>);

impl<C: Nest, B: BlockLen> Nest for StridedBlock<C, B> {
    const DEPTH: usize = C::DEPTH + 1;
    const MODE: BlockLengthMode = mode_of::<C, B>();

    fn push_kinds(shape: &mut Shape) {
        shape.push(Kind::StridedBlock);
        C::push_kinds(shape);
    }

    #[inline(always)]
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F) {
        visit_level::<C, B, F>(Kind::StridedBlock, dt, base, f);
    }
}

pub struct BlockIndexed<C, B = Generic>(PhantomData<(C, B)>);

impl<C: Nest, B: BlockLen> Nest for BlockIndexed<C, B> {
    const DEPTH: usize = C::DEPTH + 1;
    const MODE: BlockLengthMode = mode_of::<C, B>();

    fn push_kinds(shape: &mut Shape) {
        shape.push(Kind::BlockIndexed);
        C::push_kinds(shape);
    }

    #[inline(always)]
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F) {
        visit_level::<C, B, F>(Kind::BlockIndexed, dt, base, f);
    }
}

pub struct VariableIndexed<C>(PhantomData<C>);

impl<C: Nest> Nest for VariableIndexed<C> {
    const DEPTH: usize = C::DEPTH + 1;
    const MODE: BlockLengthMode = C::MODE;

    fn push_kinds(shape: &mut Shape) {
        shape.push(Kind::VariableIndexed);
        C::push_kinds(shape);
    }

    #[inline(always)]
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F) {
        visit_level::<C, Generic, F>(Kind::VariableIndexed, dt, base, f);
    }
}

pub struct Resized<C>(PhantomData<C>);

impl<C: Nest> Nest for Resized<C> {
    const DEPTH: usize = C::DEPTH + 1;
    const MODE: BlockLengthMode = C::MODE;

    fn push_kinds(shape: &mut Shape) {
        shape.push(Kind::Resized);
        C::push_kinds(shape);
    }

    #[inline(always)]
    fn visit<F: FnMut(isize)>(dt: &Datatype, base: isize, f: &mut F) {
        visit_level::<C, Generic, F>(Kind::Resized, dt, base, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_layout::BasicType;

    type Inner = StridedBlock<Leaf, Fixed<2>>;

    #[test]
    fn test_shape_and_mode() {
        assert_eq!(Leaf::shape(), Shape::new());
        assert_eq!(
            Contiguous::<Inner>::shape(),
            Shape::from_kinds(&[Kind::Contiguous, Kind::StridedBlock])
        );
        assert_eq!(Contiguous::<Inner>::DEPTH, 2);
        assert_eq!(Contiguous::<Inner>::MODE, BlockLengthMode::Fixed(2));
        assert_eq!(
            StridedBlock::<Resized<Leaf>>::MODE,
            BlockLengthMode::Generic
        );
        assert_eq!(
            BlockIndexed::<BlockIndexed<Leaf, Fixed<7>>>::MODE,
            BlockLengthMode::Fixed(7)
        );
    }

    #[test]
    fn test_visit_matches_layout() {
        let int = Datatype::basic(BasicType::Int32);
        let v = Datatype::vector(3, 2, 5, &int).unwrap();
        let mut seen = Vec::new();
        Inner::visit(&v, 0, &mut |o| seen.push(o));
        assert_eq!(seen, vec![0, 1, 5, 6, 10, 11]);

        let c = Datatype::contiguous(2, &v).unwrap();
        seen.clear();
        Contiguous::<StridedBlock<Leaf>>::visit(&c, 100, &mut |o| seen.push(o));
        assert_eq!(seen, vec![100, 101, 105, 106, 110, 111, 112, 113, 117, 118, 122, 123]);
    }

    #[test]
    fn test_visit_agrees_with_formula() {
        let int = Datatype::basic(BasicType::Int32);
        let inner = Datatype::hindexed_block(3, 2, &[40, 0, 16], &int).unwrap();
        let outer = Datatype::hvector(2, 2, 4 * 50, &inner).unwrap();

        let mut visited = Vec::new();
        StridedBlock::<BlockIndexed<Leaf, Fixed<2>>>::visit(&outer, 0, &mut |o| visited.push(o));
        let mut expected = Vec::new();
        crate::Formula::build(&outer).for_each_offset(1, |o| expected.push(o));
        assert_eq!(visited.len(), 2 * 2 * 6);
        assert_eq!(visited, expected);
    }
}
