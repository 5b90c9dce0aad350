//! Parameter-free nesting sequences.

use std::fmt;

use smallvec::SmallVec;

/// Block lengths that get a dedicated kernel when the innermost level is a
/// [`Kind::StridedBlock`] or [`Kind::BlockIndexed`].
pub const FIXED_BLOCKLENGTHS: [usize; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

/// Constructor kind of a composite layout level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// `count` tightly packed repetitions of the child.
    Contiguous,
    /// `count` blocks of `blocklength` children, a constant stride apart.
    StridedBlock,
    /// `count` blocks of `blocklength` children at per-block displacements.
    BlockIndexed,
    /// Like [`Kind::BlockIndexed`] with a per-block length.
    VariableIndexed,
    /// Rebinds the extent of the child.
    Resized,
}

impl Kind {
    /// Every composite kind, in declaration order.
    pub const ALL: [Kind; 5] = [
        Kind::Contiguous,
        Kind::StridedBlock,
        Kind::BlockIndexed,
        Kind::VariableIndexed,
        Kind::Resized,
    ];

    /// Whether the kind carries a single scalar block length, so a
    /// fixed-blocklength kernel can exist when it is innermost.
    pub const fn has_scalar_blocklength(self) -> bool {
        matches!(self, Kind::StridedBlock | Kind::BlockIndexed)
    }

    /// Short name used in kernel identities.
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Contiguous => "contig",
            Kind::StridedBlock => "hvector",
            Kind::BlockIndexed => "blkhindx",
            Kind::VariableIndexed => "hindexed",
            Kind::Resized => "resized",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether the innermost block length is a kernel constant or read at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockLengthMode {
    Fixed(usize),
    Generic,
}

impl fmt::Display for BlockLengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLengthMode::Fixed(n) => write!(f, "blklen_{n}"),
            BlockLengthMode::Generic => f.write_str("blklen_generic"),
        }
    }
}

/// Ordered composite kinds, outermost first; the leaf is implicit.
///
/// The empty shape is a bare basic element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shape(SmallVec<[Kind; 4]>);

impl Shape {
    /// The empty shape.
    pub fn new() -> Self {
        Shape(SmallVec::new())
    }

    pub fn from_kinds(kinds: &[Kind]) -> Self {
        Shape(SmallVec::from_slice(kinds))
    }

    pub fn kinds(&self) -> &[Kind] {
        &self.0
    }

    /// Number of composite levels.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Innermost composite kind, if any.
    pub fn innermost(&self) -> Option<Kind> {
        self.0.last().copied()
    }

    /// Append a kind below the current innermost level.
    pub fn push(&mut self, kind: Kind) {
        self.0.push(kind);
    }

    /// Whether a [`BlockLengthMode::Fixed`] kernel may exist for this shape.
    pub fn admits_fixed_blocklength(&self) -> bool {
        self.innermost().is_some_and(Kind::has_scalar_blocklength)
    }
}

impl FromIterator<Kind> for Shape {
    fn from_iter<I: IntoIterator<Item = Kind>>(iter: I) -> Self {
        Shape(iter.into_iter().collect())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("basic");
        }
        for (i, kind) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("_")?;
            }
            f.write_str(kind.name())?;
        }
        Ok(())
    }
}
