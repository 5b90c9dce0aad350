//! Closed-form offset formulas.
//!
//! A [`Formula`] flattens a layout tree into one [`LevelTerm`] per composite
//! level. The element offset of a repetition `i` and per-level indices is
//!
//! ```text
//! offset = i * extent + sum(level.contribution(index_l))
//! ```
//!
//! where each level contributes independently of the others:
//!
//! | kind       | contribution                         | `within` bound      |
//! |------------|--------------------------------------|---------------------|
//! | `contig`   | `block * child_extent`               | 1                   |
//! | `hvector`  | `block * stride + within * child_extent` | `blocklength`   |
//! | `blkhindx` | `displs[block] + within * child_extent`  | `blocklength`   |
//! | `hindexed` | `displs[block] + within * child_extent`  | `blocklengths[block]` |
//! | `resized`  | 0                                    | 1                   |
//!
//! The leaf has extent 1, so the innermost level's `within` index steps over
//! single elements.

use pup_layout::{Datatype, Kind, LayoutNode};
use smallvec::SmallVec;

/// Loop indices of one composite level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelIndex {
    /// Block index, `0..count`.
    pub block: usize,
    /// Index within the block.
    pub within: usize,
}

impl LevelIndex {
    pub const fn new(block: usize, within: usize) -> Self {
        LevelIndex { block, within }
    }
}

/// Parameters of one composite level, borrowed from the layout tree.
#[derive(Debug, Clone, Copy)]
pub struct LevelTerm<'a> {
    pub kind: Kind,
    pub count: usize,
    /// Scalar block length; 1 for kinds without one.
    pub blocklength: usize,
    /// Per-block lengths of a variable-indexed level.
    pub blocklengths: Option<&'a [usize]>,
    /// Block stride of a strided level.
    pub stride: isize,
    /// Per-block starts of an indexed level.
    pub displacements: Option<&'a [isize]>,
    pub child_extent: isize,
}

impl<'a> LevelTerm<'a> {
    fn plain(kind: Kind, count: usize, child: &Datatype) -> Self {
        LevelTerm {
            kind,
            count,
            blocklength: 1,
            blocklengths: None,
            stride: 0,
            displacements: None,
            child_extent: child.extent() as isize,
        }
    }

    /// The term for `node` and the child it recurses into, `None` for a leaf.
    pub fn from_node(node: &'a LayoutNode) -> Option<(Self, &'a Datatype)> {
        let term = match node {
            LayoutNode::Leaf(_) => return None,
            LayoutNode::Contiguous { count, child } => {
                (Self::plain(Kind::Contiguous, *count, child), &**child)
            }
            LayoutNode::StridedBlock {
                count,
                blocklength,
                stride,
                child,
            } => (
                LevelTerm {
                    blocklength: *blocklength,
                    stride: *stride,
                    ..Self::plain(Kind::StridedBlock, *count, child)
                },
                &**child,
            ),
            LayoutNode::BlockIndexed {
                count,
                blocklength,
                displacements,
                child,
            } => (
                LevelTerm {
                    blocklength: *blocklength,
                    displacements: Some(&displacements[..]),
                    ..Self::plain(Kind::BlockIndexed, *count, child)
                },
                &**child,
            ),
            LayoutNode::VariableIndexed {
                count,
                blocklengths,
                displacements,
                child,
            } => (
                LevelTerm {
                    blocklengths: Some(&blocklengths[..]),
                    displacements: Some(&displacements[..]),
                    ..Self::plain(Kind::VariableIndexed, *count, child)
                },
                &**child,
            ),
            LayoutNode::Resized { child, .. } => (Self::plain(Kind::Resized, 1, child), &**child),
        };
        Some(term)
    }

    /// Number of `within` indices for block `block`.
    pub fn block_len(&self, block: usize) -> usize {
        match self.blocklengths {
            Some(lengths) => lengths.get(block).copied().unwrap_or(0),
            None => self.blocklength,
        }
    }

    /// This level's share of the offset, `None` when `index` is out of range.
    pub fn contribution(&self, index: LevelIndex) -> Option<isize> {
        if index.block >= self.count || index.within >= self.block_len(index.block) {
            return None;
        }
        let block = index.block as isize;
        let within = (index.within as isize).checked_mul(self.child_extent)?;
        match self.kind {
            Kind::Contiguous => block.checked_mul(self.child_extent),
            Kind::StridedBlock => block.checked_mul(self.stride)?.checked_add(within),
            Kind::BlockIndexed | Kind::VariableIndexed => {
                self.displacements?.get(index.block)?.checked_add(within)
            }
            Kind::Resized => Some(0),
        }
    }
}

/// Per-level offset recurrence of a layout.
#[derive(Debug, Clone)]
pub struct Formula<'a> {
    extent: isize,
    levels: SmallVec<[LevelTerm<'a>; 4]>,
}

impl<'a> Formula<'a> {
    /// Flatten `dt` into one term per composite level, outermost first.
    pub fn build(dt: &'a Datatype) -> Self {
        let mut levels = SmallVec::new();
        let mut current = dt;
        while let Some((term, child)) = LevelTerm::from_node(current.node()) {
            levels.push(term);
            current = child;
        }
        Formula {
            extent: dt.extent() as isize,
            levels,
        }
    }

    pub fn levels(&self) -> &[LevelTerm<'a>] {
        &self.levels
    }

    pub fn extent(&self) -> isize {
        self.extent
    }

    /// Offset of repetition `i` at `indices` (one per level, outermost first).
    pub fn offset(&self, i: usize, indices: &[LevelIndex]) -> Option<isize> {
        if indices.len() != self.levels.len() {
            return None;
        }
        let start = (i as isize).checked_mul(self.extent)?;
        self.levels
            .iter()
            .zip(indices)
            .try_fold(start, |acc, (term, &index)| {
                acc.checked_add(term.contribution(index)?)
            })
    }

    /// Call `f` with every offset of `count` repetitions in nesting order.
    pub fn for_each_offset<F: FnMut(isize)>(&self, count: usize, mut f: F) {
        for i in 0..count {
            walk(&self.levels, i as isize * self.extent, &mut f);
        }
    }
}

fn walk<F: FnMut(isize)>(levels: &[LevelTerm<'_>], base: isize, f: &mut F) {
    let Some((term, rest)) = levels.split_first() else {
        f(base);
        return;
    };
    for block in 0..term.count {
        for within in 0..term.block_len(block) {
            if let Some(c) = term.contribution(LevelIndex::new(block, within)) {
                walk(rest, base + c, f);
            }
        }
    }
}
