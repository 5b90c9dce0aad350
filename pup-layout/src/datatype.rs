//! Nested layout descriptors.
//!
//! A [`Datatype`] is immutable once built. All strides, displacements and
//! extents are stored in element units of its [`BasicType`]; constructors
//! take byte values and normalize them once so traversal never divides.

use std::fmt;
use std::sync::Arc;

use crate::{BasicType, Kind, PupError, Result, Shape};

// ============================================================================
// Arithmetic helpers
// ============================================================================

fn to_isize(n: usize) -> Result<isize> {
    isize::try_from(n).map_err(|_| PupError::OffsetOverflow)
}

fn mul(a: usize, b: usize) -> Result<usize> {
    a.checked_mul(b).ok_or(PupError::OffsetOverflow)
}

/// Convert a byte quantity to whole elements of `basic`.
fn bytes_to_elems(what: &'static str, bytes: isize, basic: BasicType) -> Result<isize> {
    let size = basic.size() as isize;
    if bytes % size != 0 {
        return Err(PupError::Unaligned {
            what,
            value: bytes,
            elem_size: basic.size(),
        });
    }
    Ok(bytes / size)
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(PupError::LengthMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

/// Running lb/ub and data bounds over the non-empty blocks of a level.
struct Bounds {
    lb: isize,
    ub: isize,
    true_lb: isize,
    true_ub: isize,
    any_block: bool,
    any_data: bool,
}

impl Bounds {
    fn new() -> Self {
        Bounds {
            lb: 0,
            ub: 0,
            true_lb: 0,
            true_ub: 0,
            any_block: false,
            any_data: false,
        }
    }

    /// Fold in `blocklength` repetitions of `child` starting at `base`.
    fn add_block(&mut self, base: isize, blocklength: usize, child: &Datatype) -> Result<()> {
        if blocklength == 0 {
            return Ok(());
        }
        let span = to_isize(mul(blocklength, child.extent)?)?;
        let lo = base.checked_add(child.lb).ok_or(PupError::OffsetOverflow)?;
        let hi = lo.checked_add(span).ok_or(PupError::OffsetOverflow)?;
        if self.any_block {
            self.lb = self.lb.min(lo);
            self.ub = self.ub.max(hi);
        } else {
            self.lb = lo;
            self.ub = hi;
            self.any_block = true;
        }

        if child.num_elements > 0 {
            let last = to_isize(mul(blocklength - 1, child.extent)?)?;
            let tlo = base
                .checked_add(child.true_lb)
                .ok_or(PupError::OffsetOverflow)?;
            let thi = base
                .checked_add(last)
                .and_then(|v| v.checked_add(child.true_ub))
                .ok_or(PupError::OffsetOverflow)?;
            if self.any_data {
                self.true_lb = self.true_lb.min(tlo);
                self.true_ub = self.true_ub.max(thi);
            } else {
                self.true_lb = tlo;
                self.true_ub = thi;
                self.any_data = true;
            }
        }
        Ok(())
    }

    fn extent(&self) -> Result<usize> {
        self.ub
            .checked_sub(self.lb)
            .and_then(|span| usize::try_from(span).ok())
            .ok_or(PupError::OffsetOverflow)
    }
}

/// Whether instances of `child` laid out block by block form one ascending
/// dense run.
fn blocks_are_dense<I>(child: &Datatype, blocks: I) -> bool
where
    I: IntoIterator<Item = (isize, usize)>,
{
    if !child.dense {
        return false;
    }
    let n = child.num_elements as isize;
    if n == 0 {
        return true;
    }
    let ext = child.extent as isize;
    let mut next: Option<isize> = None;
    for (base, blocklength) in blocks {
        if blocklength == 0 {
            continue;
        }
        if blocklength > 1 && ext != n {
            return false;
        }
        if let Some(expected) = next {
            if base != expected {
                return false;
            }
        }
        let tail = (blocklength as isize - 1)
            .checked_mul(ext)
            .and_then(|v| v.checked_add(base))
            .and_then(|v| v.checked_add(n));
        match tail {
            Some(t) => next = Some(t),
            None => return false,
        }
    }
    true
}

// ============================================================================
// LayoutNode
// ============================================================================

/// One level of a layout tree.
///
/// Strides, displacements and extents are in element units of the tree's
/// basic type.
#[derive(Debug, Clone)]
pub enum LayoutNode {
    /// A single basic element.
    Leaf(BasicType),
    /// `count` repetitions of `child`, `child.extent()` apart.
    Contiguous { count: usize, child: Arc<Datatype> },
    /// `count` blocks of `blocklength` children; block `j` starts at `j * stride`.
    StridedBlock {
        count: usize,
        blocklength: usize,
        stride: isize,
        child: Arc<Datatype>,
    },
    /// `count` blocks of `blocklength` children; block `j` starts at
    /// `displacements[j]`.
    BlockIndexed {
        count: usize,
        blocklength: usize,
        displacements: Box<[isize]>,
        child: Arc<Datatype>,
    },
    /// `count` blocks; block `j` holds `blocklengths[j]` children starting at
    /// `displacements[j]`.
    VariableIndexed {
        count: usize,
        blocklengths: Box<[usize]>,
        displacements: Box<[isize]>,
        child: Arc<Datatype>,
    },
    /// `child` with its lower bound and extent replaced.
    Resized {
        lb: isize,
        extent: usize,
        child: Arc<Datatype>,
    },
}

impl LayoutNode {
    /// Composite kind of this level, `None` for a leaf.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            LayoutNode::Leaf(_) => None,
            LayoutNode::Contiguous { .. } => Some(Kind::Contiguous),
            LayoutNode::StridedBlock { .. } => Some(Kind::StridedBlock),
            LayoutNode::BlockIndexed { .. } => Some(Kind::BlockIndexed),
            LayoutNode::VariableIndexed { .. } => Some(Kind::VariableIndexed),
            LayoutNode::Resized { .. } => Some(Kind::Resized),
        }
    }

    /// The nested descriptor, `None` for a leaf.
    pub fn child(&self) -> Option<&Arc<Datatype>> {
        match self {
            LayoutNode::Leaf(_) => None,
            LayoutNode::Contiguous { child, .. }
            | LayoutNode::StridedBlock { child, .. }
            | LayoutNode::BlockIndexed { child, .. }
            | LayoutNode::VariableIndexed { child, .. }
            | LayoutNode::Resized { child, .. } => Some(child),
        }
    }
}

// ============================================================================
// Datatype
// ============================================================================

/// A layout tree together with the metadata derived from it.
#[derive(Debug, Clone)]
pub struct Datatype {
    node: LayoutNode,
    basic: BasicType,
    extent: usize,
    lb: isize,
    true_lb: isize,
    true_ub: isize,
    num_elements: usize,
    depth: usize,
    dense: bool,
}

impl Datatype {
    /// A single element of `basic`.
    pub fn basic(basic: BasicType) -> Arc<Datatype> {
        Arc::new(Datatype {
            node: LayoutNode::Leaf(basic),
            basic,
            extent: 1,
            lb: 0,
            true_lb: 0,
            true_ub: 1,
            num_elements: 1,
            depth: 0,
            dense: true,
        })
    }

    fn composite(
        node: LayoutNode,
        child: &Datatype,
        bounds: Bounds,
        num_elements: usize,
        dense: bool,
    ) -> Result<Arc<Datatype>> {
        let (lb, extent) = if bounds.any_block {
            (bounds.lb, bounds.extent()?)
        } else {
            (0, 0)
        };
        let (true_lb, true_ub) = if bounds.any_data {
            (bounds.true_lb, bounds.true_ub)
        } else {
            (0, 0)
        };
        // Byte sizes must stay representable for the accessors.
        mul(extent, child.basic.size())?;
        mul(num_elements, child.basic.size())?;
        Ok(Arc::new(Datatype {
            node,
            basic: child.basic,
            extent,
            lb,
            true_lb,
            true_ub,
            num_elements,
            depth: child.depth + 1,
            dense,
        }))
    }

    /// `count` tightly packed copies of `child`.
    pub fn contiguous(count: usize, child: &Arc<Datatype>) -> Result<Arc<Datatype>> {
        let ext = to_isize(child.extent)?;
        let mut bounds = Bounds::new();
        if count > 0 {
            bounds.add_block(0, 1, child)?;
            let last = to_isize(count - 1)?
                .checked_mul(ext)
                .ok_or(PupError::OffsetOverflow)?;
            bounds.add_block(last, 1, child)?;
        }
        let num_elements = mul(count, child.num_elements)?;
        let dense = child.dense
            && (count <= 1 || child.num_elements == 0 || child.extent == child.num_elements);
        let node = LayoutNode::Contiguous {
            count,
            child: Arc::clone(child),
        };
        Self::composite(node, child, bounds, num_elements, dense)
    }

    /// Strided blocks with the stride given in multiples of the child's extent.
    pub fn vector(
        count: usize,
        blocklength: usize,
        stride: isize,
        child: &Arc<Datatype>,
    ) -> Result<Arc<Datatype>> {
        let stride = stride
            .checked_mul(to_isize(child.extent)?)
            .ok_or(PupError::OffsetOverflow)?;
        Self::strided(count, blocklength, stride, child)
    }

    /// Strided blocks with the stride given in bytes.
    pub fn hvector(
        count: usize,
        blocklength: usize,
        stride_bytes: isize,
        child: &Arc<Datatype>,
    ) -> Result<Arc<Datatype>> {
        let stride = bytes_to_elems("stride", stride_bytes, child.basic)?;
        Self::strided(count, blocklength, stride, child)
    }

    fn strided(
        count: usize,
        blocklength: usize,
        stride: isize,
        child: &Arc<Datatype>,
    ) -> Result<Arc<Datatype>> {
        let mut bounds = Bounds::new();
        if count > 0 {
            bounds.add_block(0, blocklength, child)?;
            let last = to_isize(count - 1)?
                .checked_mul(stride)
                .ok_or(PupError::OffsetOverflow)?;
            bounds.add_block(last, blocklength, child)?;
        }
        let num_elements = mul(mul(count, blocklength)?, child.num_elements)?;
        let dense = blocks_are_dense(
            child,
            [(0isize, blocklength), (stride, blocklength)]
                .into_iter()
                .take(count.min(2)),
        );
        let node = LayoutNode::StridedBlock {
            count,
            blocklength,
            stride,
            child: Arc::clone(child),
        };
        Self::composite(node, child, bounds, num_elements, dense)
    }

    /// `count` blocks of `blocklength` children at byte displacements.
    pub fn hindexed_block(
        count: usize,
        blocklength: usize,
        displacements_bytes: &[isize],
        child: &Arc<Datatype>,
    ) -> Result<Arc<Datatype>> {
        check_len("displacements", count, displacements_bytes.len())?;
        let displacements = displacements_bytes
            .iter()
            .map(|&d| bytes_to_elems("displacement", d, child.basic))
            .collect::<Result<Box<[isize]>>>()?;

        let mut bounds = Bounds::new();
        for &d in displacements.iter() {
            bounds.add_block(d, blocklength, child)?;
        }
        let num_elements = mul(mul(count, blocklength)?, child.num_elements)?;
        let dense = blocks_are_dense(child, displacements.iter().map(|&d| (d, blocklength)));
        let node = LayoutNode::BlockIndexed {
            count,
            blocklength,
            displacements,
            child: Arc::clone(child),
        };
        Self::composite(node, child, bounds, num_elements, dense)
    }

    /// `count` blocks of per-block length at byte displacements.
    pub fn hindexed(
        count: usize,
        blocklengths: &[usize],
        displacements_bytes: &[isize],
        child: &Arc<Datatype>,
    ) -> Result<Arc<Datatype>> {
        check_len("blocklengths", count, blocklengths.len())?;
        check_len("displacements", count, displacements_bytes.len())?;
        let displacements = displacements_bytes
            .iter()
            .map(|&d| bytes_to_elems("displacement", d, child.basic))
            .collect::<Result<Box<[isize]>>>()?;

        let mut bounds = Bounds::new();
        let mut total = 0usize;
        for (&d, &bl) in displacements.iter().zip(blocklengths) {
            bounds.add_block(d, bl, child)?;
            total = total.checked_add(bl).ok_or(PupError::OffsetOverflow)?;
        }
        let num_elements = mul(total, child.num_elements)?;
        let dense = blocks_are_dense(
            child,
            displacements.iter().copied().zip(blocklengths.iter().copied()),
        );
        let node = LayoutNode::VariableIndexed {
            count,
            blocklengths: blocklengths.into(),
            displacements,
            child: Arc::clone(child),
        };
        Self::composite(node, child, bounds, num_elements, dense)
    }

    /// `child` with lower bound and extent (both in bytes) replaced.
    pub fn resized(lb_bytes: isize, extent_bytes: usize, child: &Arc<Datatype>) -> Result<Arc<Datatype>> {
        let lb = bytes_to_elems("lower bound", lb_bytes, child.basic)?;
        let extent = bytes_to_elems("extent", to_isize(extent_bytes)?, child.basic)? as usize;
        lb.checked_add(to_isize(extent)?)
            .ok_or(PupError::OffsetOverflow)?;
        Ok(Arc::new(Datatype {
            node: LayoutNode::Resized {
                lb,
                extent,
                child: Arc::clone(child),
            },
            basic: child.basic,
            extent,
            lb,
            true_lb: child.true_lb,
            true_ub: child.true_ub,
            num_elements: child.num_elements,
            depth: child.depth + 1,
            dense: child.dense,
        }))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn node(&self) -> &LayoutNode {
        &self.node
    }

    pub fn basic_type(&self) -> BasicType {
        self.basic
    }

    /// Distance between consecutive instances, in elements.
    pub fn extent(&self) -> usize {
        self.extent
    }

    pub fn extent_bytes(&self) -> usize {
        self.extent * self.basic.size()
    }

    /// Lower bound, in elements.
    pub fn lb(&self) -> isize {
        self.lb
    }

    /// Lowest element offset touched by one instance.
    pub fn true_lb(&self) -> isize {
        self.true_lb
    }

    /// One past the highest element offset touched by one instance.
    pub fn true_ub(&self) -> isize {
        self.true_ub
    }

    /// Basic elements carried by one instance.
    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Packed size of one instance in bytes.
    pub fn size_bytes(&self) -> usize {
        self.num_elements * self.basic.size()
    }

    /// Number of composite levels above the leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether `count` instances occupy one dense run from offset 0, so that
    /// packing them is a plain copy.
    pub fn is_contig(&self) -> bool {
        self.num_elements == 0
            || (self.dense && self.true_lb == 0 && self.extent == self.num_elements)
    }

    /// Composite kinds from this node down to the leaf.
    pub fn shape(&self) -> Shape {
        let mut shape = Shape::new();
        let mut node = &self.node;
        while let (Some(kind), Some(child)) = (node.kind(), node.child()) {
            shape.push(kind);
            node = &child.node;
        }
        shape
    }

    /// Block length of the innermost composite level when that level is a
    /// strided or block-indexed one.
    pub fn innermost_blocklength(&self) -> Option<usize> {
        let mut node = &self.node;
        let mut found = None;
        while let Some(child) = node.child() {
            found = match node {
                LayoutNode::StridedBlock { blocklength, .. }
                | LayoutNode::BlockIndexed { blocklength, .. } => Some(*blocklength),
                _ => None,
            };
            node = &child.node;
        }
        found
    }

    /// Elements a described buffer needs to hold `count` instances.
    pub fn described_len(&self, count: usize) -> Result<usize> {
        if count == 0 || self.num_elements == 0 {
            return Ok(0);
        }
        if self.true_lb < 0 {
            return Err(PupError::NegativeOffset(self.true_lb));
        }
        let reps = to_isize(mul(count - 1, self.extent)?)?;
        let end = reps
            .checked_add(self.true_ub)
            .ok_or(PupError::OffsetOverflow)?;
        Ok(end as usize)
    }

    /// Elements a packed buffer needs to hold `count` instances.
    pub fn packed_len(&self, count: usize) -> Result<usize> {
        mul(count, self.num_elements)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            LayoutNode::Leaf(basic) => write!(f, "{basic}"),
            LayoutNode::Contiguous { count, child } => write!(f, "contig({count}) of {child}"),
            LayoutNode::StridedBlock {
                count,
                blocklength,
                stride,
                child,
            } => write!(
                f,
                "hvector({count}, blocklength={blocklength}, stride={stride}) of {child}"
            ),
            LayoutNode::BlockIndexed {
                count,
                blocklength,
                displacements,
                child,
            } => write!(
                f,
                "blkhindx({count}, blocklength={blocklength}, displs={displacements:?}) of {child}"
            ),
            LayoutNode::VariableIndexed {
                count,
                blocklengths,
                displacements,
                child,
            } => write!(
                f,
                "hindexed({count}, blocklengths={blocklengths:?}, displs={displacements:?}) of {child}"
            ),
            LayoutNode::Resized { lb, extent, child } => {
                write!(f, "resized(lb={lb}, extent={extent}) of {child}")
            }
        }
    }
}
