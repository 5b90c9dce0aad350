//! The process-wide kernel table.
//!
//! Kernels are instantiated by recursing over nest types: every seed
//! (innermost level) is registered, then wrapped by each composite kind
//! until the compiled depth budget runs out. The table is built on first
//! use and shared for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;

use pup_layout::{BasicType, BlockLengthMode, Shape};
use pup_traits::{Element, PodComplexF32, PodComplexF64, ReduceOp};
use tracing::debug;

use crate::kernel::{acc_unpack_bytes, pack_bytes, unpack_bytes, KernelFn};
use crate::nest::{
    BlockIndexed, BlockLen, Contiguous, Fixed, Generic, Leaf, Nest, Resized, StridedBlock,
    VariableIndexed,
};
use crate::storage::Storage;
use crate::Operation;

/// Deepest shape with a specialized kernel.
#[cfg(not(feature = "nesting-3"))]
pub const SPECIALIZED_MAX_DEPTH: usize = 2;
#[cfg(feature = "nesting-3")]
pub const SPECIALIZED_MAX_DEPTH: usize = 3;

// Wrapping levels applied on top of the depth-1 seeds.
#[cfg(not(feature = "nesting-3"))]
type SeedBudget = More<Stop>;
#[cfg(feature = "nesting-3")]
type SeedBudget = More<More<Stop>>;

// ============================================================================
// KernelKey
// ============================================================================

/// Identity of a specialized kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelKey {
    shape: Shape,
    mode: BlockLengthMode,
    basic: BasicType,
    operation: Operation,
}

impl KernelKey {
    pub fn new(shape: Shape, mode: BlockLengthMode, basic: BasicType, operation: Operation) -> Self {
        KernelKey {
            shape,
            mode,
            basic,
            operation,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn mode(&self) -> BlockLengthMode {
        self.mode
    }

    pub fn basic(&self) -> BasicType {
        self.basic
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

/// `<op>_<kind>_..._<kind>[_blklen_<n|generic>]_<type>`
impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.operation, self.shape)?;
        if self.shape.admits_fixed_blocklength() {
            write!(f, "_{}", self.mode)?;
        }
        write!(f, "_{}", self.basic)
    }
}

// ============================================================================
// KernelTable
// ============================================================================

/// Every specialized kernel, keyed by identity.
pub struct KernelTable {
    kernels: HashMap<KernelKey, KernelFn>,
}

impl KernelTable {
    /// The shared table, built on first call.
    pub fn global() -> &'static KernelTable {
        static TABLE: OnceLock<KernelTable> = OnceLock::new();
        TABLE.get_or_init(KernelTable::build)
    }

    fn build() -> KernelTable {
        let mut table = KernelTable {
            kernels: HashMap::new(),
        };
        // Bare elements: unpack of a basic type is a plain copy.
        table.register_nest::<Leaf>();
        register_seeds::<SeedBudget>(&mut table);
        debug!(
            kernels = table.kernels.len(),
            max_depth = SPECIALIZED_MAX_DEPTH,
            "built pack/unpack kernel table"
        );
        table
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn contains(&self, key: &KernelKey) -> bool {
        self.kernels.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KernelKey> {
        self.kernels.keys()
    }

    pub(crate) fn get(&self, key: &KernelKey) -> Option<KernelFn> {
        self.kernels.get(key).copied()
    }

    fn insert(&mut self, key: KernelKey, kernel: KernelFn) {
        let previous = self.kernels.insert(key, kernel);
        debug_assert!(previous.is_none(), "kernel registered twice");
    }

    /// Register every operation on every basic type for the nest `N`.
    fn register_nest<N: Nest>(&mut self) {
        let shape = N::shape();
        for basic in BasicType::ALL {
            let key = |operation| KernelKey::new(shape.clone(), N::MODE, basic, operation);
            let (pack, unpack) = movers::<N>(Storage::of(basic));
            self.insert(key(Operation::Pack), pack);
            if N::DEPTH > 0 {
                self.insert(key(Operation::Unpack), unpack);
            }
            if let Some(acc) = reducer::<N>(basic) {
                for op in ReduceOp::ALL {
                    self.insert(key(Operation::AccumulateUnpack(op)), acc);
                }
            }
        }
    }
}

fn movers<N: Nest>(storage: Storage) -> (KernelFn, KernelFn) {
    match storage {
        Storage::U8 => movers_for::<u8, N>(),
        Storage::U16 => movers_for::<u16, N>(),
        Storage::U32 => movers_for::<u32, N>(),
        Storage::U64 => movers_for::<u64, N>(),
        Storage::U32x2 => movers_for::<[u32; 2], N>(),
        Storage::U64x2 => movers_for::<[u64; 2], N>(),
    }
}

fn movers_for<T: Element, N: Nest>() -> (KernelFn, KernelFn) {
    (pack_bytes::<T, N>, unpack_bytes::<T, N>)
}

fn reducer<N: Nest>(basic: BasicType) -> Option<KernelFn> {
    let kernel: KernelFn = match basic {
        BasicType::Bool | BasicType::LongDouble => return None,
        BasicType::Char | BasicType::Int8 => acc_unpack_bytes::<i8, N>,
        BasicType::Int16 => acc_unpack_bytes::<i16, N>,
        BasicType::WChar | BasicType::Int32 => acc_unpack_bytes::<i32, N>,
        BasicType::Int64 => acc_unpack_bytes::<i64, N>,
        BasicType::Float => acc_unpack_bytes::<f32, N>,
        BasicType::Double => acc_unpack_bytes::<f64, N>,
        BasicType::ComplexFloat => acc_unpack_bytes::<PodComplexF32, N>,
        BasicType::ComplexDouble => acc_unpack_bytes::<PodComplexF64, N>,
    };
    Some(kernel)
}

// ============================================================================
// Depth budget
// ============================================================================

/// Remaining wrapping levels during registration.
trait Budget {
    fn register<S: Nest>(table: &mut KernelTable);
}

/// No more levels: register the nest as is.
#[allow(dead_code)] // type-level only
struct Stop;

/// Register the nest, then every one-level wrapping of it with `L` left.
#[allow(dead_code)] // type-level only
struct More<L>(PhantomData<L>);

impl Budget for Stop {
    fn register<S: Nest>(table: &mut KernelTable) {
        table.register_nest::<S>();
    }
}

impl<L: Budget> Budget for More<L> {
    fn register<S: Nest>(table: &mut KernelTable) {
        table.register_nest::<S>();
        L::register::<Contiguous<S>>(table);
        L::register::<StridedBlock<S>>(table);
        L::register::<BlockIndexed<S>>(table);
        L::register::<VariableIndexed<S>>(table);
        L::register::<Resized<S>>(table);
    }
}

fn register_blocked<L: Budget, B: BlockLen>(table: &mut KernelTable) {
    L::register::<StridedBlock<Leaf, B>>(table);
    L::register::<BlockIndexed<Leaf, B>>(table);
}

fn register_seeds<L: Budget>(table: &mut KernelTable) {
    L::register::<Contiguous<Leaf>>(table);
    L::register::<VariableIndexed<Leaf>>(table);
    L::register::<Resized<Leaf>>(table);
    register_blocked::<L, Generic>(table);
    register_blocked::<L, Fixed<1>>(table);
    register_blocked::<L, Fixed<2>>(table);
    register_blocked::<L, Fixed<3>>(table);
    register_blocked::<L, Fixed<4>>(table);
    register_blocked::<L, Fixed<5>>(table);
    register_blocked::<L, Fixed<6>>(table);
    register_blocked::<L, Fixed<7>>(table);
    register_blocked::<L, Fixed<8>>(table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_layout::Kind;

    #[test]
    fn test_key_display() {
        let key = KernelKey::new(
            Shape::from_kinds(&[Kind::StridedBlock, Kind::Contiguous]),
            BlockLengthMode::Generic,
            BasicType::Float,
            Operation::Unpack,
        );
        assert_eq!(key.to_string(), "unpack_hvector_contig_float");

        let key = KernelKey::new(
            Shape::from_kinds(&[Kind::Contiguous, Kind::StridedBlock]),
            BlockLengthMode::Fixed(2),
            BasicType::Int32,
            Operation::Pack,
        );
        assert_eq!(key.to_string(), "pack_contig_hvector_blklen_2_int32_t");
    }

    #[test]
    fn test_basic_kernels() {
        let table = KernelTable::global();
        let key = |op| KernelKey::new(Shape::new(), BlockLengthMode::Generic, BasicType::Int32, op);
        assert!(table.contains(&key(Operation::Pack)));
        assert!(table.contains(&key(Operation::AccumulateUnpack(ReduceOp::Sum))));
        assert!(!table.contains(&key(Operation::Unpack)));
    }

    #[test]
    fn test_no_fixed_kernel_without_scalar_blocklength() {
        let table = KernelTable::global();
        assert!(!table.keys().any(|k| matches!(k.mode(), BlockLengthMode::Fixed(_))
            && !k.shape().admits_fixed_blocklength()));
    }
}
