//! Kernel selection.
//!
//! [`Dispatcher::select`] maps a concrete datatype and operation to a
//! [`KernelHandle`]: a specialized kernel when its shape is in the table, the
//! generic evaluator when the shape nests deeper than configured, or a plain
//! copy for unpacking a bare element.

use std::env;
use std::fmt;

use pup_layout::{BasicType, BlockLengthMode, Datatype, PupError, Result, Shape, FIXED_BLOCKLENGTHS};
use tracing::{debug, trace};

use crate::kernel::KernelFn;
use crate::registry::{KernelKey, KernelTable, SPECIALIZED_MAX_DEPTH};
use crate::{generic, storage, Operation};

/// Environment variable overriding [`DispatchConfig::max_depth`].
pub const MAX_NESTING_ENV: &str = "STRIDED_PUP_MAX_NESTING";

/// Environment variable that disables fixed block length kernels when `1`.
pub const NO_BLKLEN_ENV: &str = "STRIDED_PUP_NO_BLKLEN";

// ============================================================================
// Configuration
// ============================================================================

/// Run-time dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Deepest shape routed to a specialized kernel; deeper shapes use the
    /// generic evaluator. Never above [`SPECIALIZED_MAX_DEPTH`].
    pub max_depth: usize,
    /// Whether fixed block length kernels are preferred when they apply.
    pub fixed_blocklength: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            max_depth: SPECIALIZED_MAX_DEPTH,
            fixed_blocklength: true,
        }
    }
}

impl DispatchConfig {
    /// Defaults overridden by [`MAX_NESTING_ENV`] and [`NO_BLKLEN_ENV`].
    pub fn from_env() -> Result<Self> {
        let mut config = DispatchConfig::default();
        if let Ok(raw) = env::var(MAX_NESTING_ENV) {
            config.max_depth = parse_max_depth(&raw)?;
        }
        if matches!(env::var(NO_BLKLEN_ENV), Ok(ref v) if v == "1") {
            config.fixed_blocklength = false;
        }
        Ok(config)
    }

    /// Set the specialization cutoff, clamped to the compiled depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(SPECIALIZED_MAX_DEPTH);
        self
    }

    pub fn with_fixed_blocklength(mut self, enabled: bool) -> Self {
        self.fixed_blocklength = enabled;
        self
    }
}

fn parse_max_depth(raw: &str) -> Result<usize> {
    let depth: isize = raw.trim().parse().map_err(|_| {
        PupError::InvalidConfig(format!("{MAX_NESTING_ENV}={raw:?} is not an integer"))
    })?;
    if depth < 0 {
        return Err(PupError::NegativeDepth(depth));
    }
    Ok((depth as usize).min(SPECIALIZED_MAX_DEPTH))
}

// ============================================================================
// KernelHandle
// ============================================================================

/// Which evaluator serves a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleKind {
    /// A table kernel compiled for this exact identity.
    Specialized(KernelKey),
    /// The depth-unbounded tree walker.
    Generic,
    /// Unpack of a bare element: a straight copy.
    DirectCopy,
}

/// A selected evaluator, bound to one operation and basic type.
#[derive(Clone)]
pub struct KernelHandle {
    kind: HandleKind,
    operation: Operation,
    basic: BasicType,
    kernel: Option<KernelFn>,
}

impl fmt::Debug for KernelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelHandle")
            .field("kind", &self.kind)
            .field("operation", &self.operation)
            .field("basic", &self.basic)
            .finish_non_exhaustive()
    }
}

impl KernelHandle {
    pub fn kind(&self) -> &HandleKind {
        &self.kind
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_specialized(&self) -> bool {
        matches!(self.kind, HandleKind::Specialized(_))
    }

    /// Run the operation over `count` instances of `dt`.
    ///
    /// For [`Operation::Pack`] `src` is the described buffer and `dst` the
    /// packed one; the unpacking operations take them the other way round.
    /// Buffers may be longer than needed; only the leading bytes are touched.
    pub fn invoke(&self, src: &[u8], dst: &mut [u8], count: usize, dt: &Datatype) -> Result<()> {
        self.check_descriptor(dt)?;
        if count == 0 || dt.num_elements() == 0 {
            return Ok(());
        }

        let size = dt.basic_type().size();
        let packed = dt.packed_len(count)?.checked_mul(size).ok_or(PupError::OffsetOverflow)?;
        let described = dt
            .described_len(count)?
            .checked_mul(size)
            .ok_or(PupError::OffsetOverflow)?;
        let (src_len, dst_len) = if self.operation.reads_packed() {
            (packed, described)
        } else {
            (described, packed)
        };
        let src = src.get(..src_len).ok_or(PupError::BufferTooSmall {
            needed: src_len,
            got: src.len(),
        })?;
        let got = dst.len();
        let dst = dst.get_mut(..dst_len).ok_or(PupError::BufferTooSmall {
            needed: dst_len,
            got,
        })?;

        match (&self.kind, self.kernel) {
            (HandleKind::DirectCopy, _) => {
                dst.copy_from_slice(src);
                Ok(())
            }
            (HandleKind::Specialized(key), Some(kernel)) => {
                if storage::is_aligned(self.basic, src, dst) {
                    kernel(self.operation, src, dst, count, dt)
                } else {
                    trace!(kernel = %key, "buffers not aligned for storage, using generic evaluator");
                    generic::evaluate(self.operation, src, dst, count, dt)
                }
            }
            _ => generic::evaluate(self.operation, src, dst, count, dt),
        }
    }

    fn check_descriptor(&self, dt: &Datatype) -> Result<()> {
        let mismatch = || PupError::KernelMismatch {
            kernel: self.describe(),
            shape: format!("{}_{}", dt.shape(), dt.basic_type()),
        };
        if dt.basic_type() != self.basic {
            return Err(mismatch());
        }
        match &self.kind {
            HandleKind::Generic => Ok(()),
            HandleKind::DirectCopy if dt.depth() == 0 => Ok(()),
            HandleKind::DirectCopy => Err(mismatch()),
            HandleKind::Specialized(key) => {
                if dt.shape() != *key.shape() {
                    return Err(mismatch());
                }
                match key.mode() {
                    BlockLengthMode::Fixed(n) if dt.innermost_blocklength() != Some(n) => {
                        Err(mismatch())
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    fn describe(&self) -> String {
        match &self.kind {
            HandleKind::Specialized(key) => key.to_string(),
            HandleKind::Generic => format!("{}_generic_{}", self.operation, self.basic),
            HandleKind::DirectCopy => format!("{}_direct_{}", self.operation, self.basic),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Selects kernels from the shared table under a [`DispatchConfig`].
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    table: &'static KernelTable,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new(DispatchConfig::default())
    }
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Dispatcher {
            config: config.with_max_depth(config.max_depth),
            table: KernelTable::global(),
        }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    pub fn table(&self) -> &'static KernelTable {
        self.table
    }

    /// Pick the evaluator for `operation` on `dt`.
    pub fn select(&self, dt: &Datatype, operation: Operation) -> Result<KernelHandle> {
        let basic = dt.basic_type();
        if !operation.is_defined_for(basic) {
            return Err(if basic.is_arithmetic() {
                PupError::UnsupportedType(basic)
            } else {
                PupError::NotArithmetic(basic)
            });
        }

        let shape = dt.shape();
        let handle = |kind, kernel| KernelHandle {
            kind,
            operation,
            basic,
            kernel,
        };

        if shape.is_empty() && operation == Operation::Unpack {
            return Ok(handle(HandleKind::DirectCopy, None));
        }
        if shape.depth() > self.config.max_depth {
            debug!(
                shape = %shape,
                depth = shape.depth(),
                max_depth = self.config.max_depth,
                "shape deeper than specialized kernels, using generic evaluator"
            );
            return Ok(handle(HandleKind::Generic, None));
        }

        for mode in self.candidate_modes(dt, &shape) {
            let key = KernelKey::new(shape.clone(), mode, basic, operation);
            if let Some(kernel) = self.table.get(&key) {
                trace!(kernel = %key, "selected specialized kernel");
                return Ok(handle(HandleKind::Specialized(key), Some(kernel)));
            }
        }
        Err(PupError::UnsupportedShape(
            KernelKey::new(shape, BlockLengthMode::Generic, basic, operation).to_string(),
        ))
    }

    /// Block length modes to try, most specific first.
    fn candidate_modes(&self, dt: &Datatype, shape: &Shape) -> Vec<BlockLengthMode> {
        let mut modes = Vec::with_capacity(2);
        if self.config.fixed_blocklength && shape.admits_fixed_blocklength() {
            if let Some(n) = dt.innermost_blocklength() {
                if FIXED_BLOCKLENGTHS.contains(&n) {
                    modes.push(BlockLengthMode::Fixed(n));
                }
            }
        }
        modes.push(BlockLengthMode::Generic);
        modes
    }
}
