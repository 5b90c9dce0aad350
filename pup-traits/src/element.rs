//! Element bounds for pack/unpack and reduction kernels.

use std::fmt;

use num_traits::{WrappingAdd, Zero};

/// A basic element that kernels move bit-for-bit.
///
/// Any `Pod` type qualifies; pack and unpack never look at the value, so the
/// kernels for `i32`, `f32` and `wchar_t` can all run on one 4-byte storage
/// type.
pub trait Element: bytemuck::Pod + Send + Sync + 'static {}

impl<T> Element for T where T: bytemuck::Pod + Send + Sync + 'static {}

/// Reduction applied by accumulate-unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReduceOp {
    /// `dst = dst + src`
    Sum,
}

impl ReduceOp {
    /// Every reduction operator, in declaration order.
    pub const ALL: [ReduceOp; 1] = [ReduceOp::Sum];

    /// Lower-case name used in kernel identities.
    pub const fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An element type that admits every [`ReduceOp`].
///
/// Integer sums wrap on overflow, matching two's-complement hardware
/// addition.
pub trait Reducible: Element {
    /// Identity of `op`, used to zero-initialize accumulation targets.
    fn identity(op: ReduceOp) -> Self;

    /// Combine the existing destination value with an incoming value.
    fn reduce(self, incoming: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_reducible_int {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => <$t as Zero>::zero(),
                    }
                }

                #[inline(always)]
                fn reduce(self, incoming: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => WrappingAdd::wrapping_add(&self, &incoming),
                    }
                }
            }
        )*
    };
}

macro_rules! impl_reducible_float {
    ($($t:ty),*) => {
        $(
            impl Reducible for $t {
                #[inline]
                fn identity(op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => <$t as Zero>::zero(),
                    }
                }

                #[inline(always)]
                fn reduce(self, incoming: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => self + incoming,
                    }
                }
            }
        )*
    };
}

impl_reducible_int!(i8, i16, i32, i64);
impl_reducible_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_element<T: Element>() {}
    fn assert_reducible<T: Reducible>() {}

    #[test]
    fn test_storage_types_are_elements() {
        assert_element::<u8>();
        assert_element::<u16>();
        assert_element::<u32>();
        assert_element::<u64>();
        assert_element::<[u32; 2]>();
        assert_element::<[u64; 2]>();
    }

    #[test]
    fn test_standard_types_are_reducible() {
        assert_reducible::<i8>();
        assert_reducible::<i16>();
        assert_reducible::<i32>();
        assert_reducible::<i64>();
        assert_reducible::<f32>();
        assert_reducible::<f64>();
    }

    #[test]
    fn test_int_sum_wraps() {
        assert_eq!(i8::MAX.reduce(1, ReduceOp::Sum), i8::MIN);
        assert_eq!(40i32.reduce(2, ReduceOp::Sum), 42);
    }

    #[test]
    fn test_float_sum() {
        approx::assert_relative_eq!(1.5f64.reduce(2.25, ReduceOp::Sum), 3.75);
        assert_eq!(f32::identity(ReduceOp::Sum), 0.0);
    }

    #[test]
    fn test_reduce_op_name() {
        assert_eq!(ReduceOp::Sum.to_string(), "sum");
    }
}
