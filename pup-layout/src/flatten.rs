//! Byte images of datatypes.
//!
//! A flattened datatype is a self-contained byte string that rebuilds an
//! equivalent layout through [`Datatype::unflatten`], for example on the far
//! side of a connection. Parameters are stored in bytes, the way the
//! constructors take them, so unflattening runs the same validation as
//! building the type by hand.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{BasicType, Datatype, LayoutNode, PupError, Result};

const FLAT_MAGIC: &[u8; 4] = b"PUPF";

#[derive(Debug, Serialize, Deserialize)]
enum FlatNode {
    Basic(BasicType),
    Contiguous {
        count: usize,
        child: Box<FlatNode>,
    },
    Hvector {
        count: usize,
        blocklength: usize,
        stride: isize,
        child: Box<FlatNode>,
    },
    BlockHindexed {
        blocklength: usize,
        displacements: Vec<isize>,
        child: Box<FlatNode>,
    },
    Hindexed {
        blocklengths: Vec<usize>,
        displacements: Vec<isize>,
        child: Box<FlatNode>,
    },
    Resized {
        lb: isize,
        extent: usize,
        child: Box<FlatNode>,
    },
}

fn to_bytes(elems: isize, size: usize) -> Result<isize> {
    elems
        .checked_mul(size as isize)
        .ok_or(PupError::OffsetOverflow)
}

fn boxed(child: &Datatype) -> Result<Box<FlatNode>> {
    FlatNode::from_datatype(child).map(Box::new)
}

fn flatten_error(err: bincode::Error) -> PupError {
    PupError::Flatten(err.to_string())
}

impl FlatNode {
    fn from_datatype(dt: &Datatype) -> Result<Self> {
        let size = dt.basic_type().size();
        let node = match dt.node() {
            LayoutNode::Leaf(basic) => FlatNode::Basic(*basic),
            LayoutNode::Contiguous { count, child } => FlatNode::Contiguous {
                count: *count,
                child: boxed(child)?,
            },
            LayoutNode::StridedBlock {
                count,
                blocklength,
                stride,
                child,
            } => FlatNode::Hvector {
                count: *count,
                blocklength: *blocklength,
                stride: to_bytes(*stride, size)?,
                child: boxed(child)?,
            },
            LayoutNode::BlockIndexed {
                blocklength,
                displacements,
                child,
                ..
            } => FlatNode::BlockHindexed {
                blocklength: *blocklength,
                displacements: displacements
                    .iter()
                    .map(|&d| to_bytes(d, size))
                    .collect::<Result<_>>()?,
                child: boxed(child)?,
            },
            LayoutNode::VariableIndexed {
                blocklengths,
                displacements,
                child,
                ..
            } => FlatNode::Hindexed {
                blocklengths: blocklengths.to_vec(),
                displacements: displacements
                    .iter()
                    .map(|&d| to_bytes(d, size))
                    .collect::<Result<_>>()?,
                child: boxed(child)?,
            },
            LayoutNode::Resized { lb, extent, child } => FlatNode::Resized {
                lb: to_bytes(*lb, size)?,
                extent: extent.checked_mul(size).ok_or(PupError::OffsetOverflow)?,
                child: boxed(child)?,
            },
        };
        Ok(node)
    }

    fn build(self) -> Result<Arc<Datatype>> {
        match self {
            FlatNode::Basic(basic) => Ok(Datatype::basic(basic)),
            FlatNode::Contiguous { count, child } => Datatype::contiguous(count, &(*child).build()?),
            FlatNode::Hvector {
                count,
                blocklength,
                stride,
                child,
            } => Datatype::hvector(count, blocklength, stride, &(*child).build()?),
            FlatNode::BlockHindexed {
                blocklength,
                displacements,
                child,
            } => Datatype::hindexed_block(
                displacements.len(),
                blocklength,
                &displacements,
                &(*child).build()?,
            ),
            FlatNode::Hindexed {
                blocklengths,
                displacements,
                child,
            } => Datatype::hindexed(
                blocklengths.len(),
                &blocklengths,
                &displacements,
                &(*child).build()?,
            ),
            FlatNode::Resized { lb, extent, child } => {
                Datatype::resized(lb, extent, &(*child).build()?)
            }
        }
    }
}

impl Datatype {
    /// Serialize the layout tree into a self-contained byte image.
    pub fn flatten(&self) -> Result<Vec<u8>> {
        let node = FlatNode::from_datatype(self)?;
        let encoded = bincode::serialize(&node).map_err(flatten_error)?;
        let mut out = Vec::with_capacity(FLAT_MAGIC.len() + encoded.len());
        out.extend_from_slice(FLAT_MAGIC);
        out.extend_from_slice(&encoded);
        Ok(out)
    }

    /// Length of the image [`Datatype::flatten`] produces.
    pub fn flatten_size(&self) -> Result<usize> {
        let node = FlatNode::from_datatype(self)?;
        let body = bincode::serialized_size(&node).map_err(flatten_error)?;
        usize::try_from(body)
            .ok()
            .and_then(|body| body.checked_add(FLAT_MAGIC.len()))
            .ok_or(PupError::OffsetOverflow)
    }

    /// Rebuild a datatype from an image made by [`Datatype::flatten`].
    pub fn unflatten(bytes: &[u8]) -> Result<Arc<Datatype>> {
        let body = bytes
            .strip_prefix(FLAT_MAGIC)
            .ok_or_else(|| PupError::Flatten("missing datatype image header".to_string()))?;
        let node: FlatNode = bincode::deserialize(body).map_err(flatten_error)?;
        node.build()
    }
}
