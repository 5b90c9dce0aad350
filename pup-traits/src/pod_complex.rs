//! POD representations of complex numbers.
//!
//! `num_complex::Complex<T>` is not `Pod`, so complex basic types travel
//! through the byte-level kernels as these `repr(C)` pairs and convert to
//! `Complex<T>` only for arithmetic.

use bytemuck::{Pod, Zeroable};
use num_complex::Complex;

use crate::element::{ReduceOp, Reducible};

/// POD representation of `Complex<f64>`: `[re, im]` with `repr(C)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Zeroable, Pod)]
pub struct PodComplexF64 {
    pub re: f64,
    pub im: f64,
}

/// POD representation of `Complex<f32>`: `[re, im]` with `repr(C)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default, Zeroable, Pod)]
pub struct PodComplexF32 {
    pub re: f32,
    pub im: f32,
}

impl From<Complex<f64>> for PodComplexF64 {
    fn from(c: Complex<f64>) -> Self {
        PodComplexF64 { re: c.re, im: c.im }
    }
}

impl From<PodComplexF64> for Complex<f64> {
    fn from(p: PodComplexF64) -> Self {
        Complex { re: p.re, im: p.im }
    }
}

impl From<Complex<f32>> for PodComplexF32 {
    fn from(c: Complex<f32>) -> Self {
        PodComplexF32 { re: c.re, im: c.im }
    }
}

impl From<PodComplexF32> for Complex<f32> {
    fn from(p: PodComplexF32) -> Self {
        Complex { re: p.re, im: p.im }
    }
}

macro_rules! impl_reducible_complex {
    ($pod:ty, $re:ty) => {
        impl Reducible for $pod {
            #[inline]
            fn identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => <$pod>::zeroed(),
                }
            }

            #[inline(always)]
            fn reduce(self, incoming: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => {
                        let sum = Complex::<$re>::from(self) + Complex::<$re>::from(incoming);
                        sum.into()
                    }
                }
            }
        }
    };
}

impl_reducible_complex!(PodComplexF32, f32);
impl_reducible_complex!(PodComplexF64, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_f64() {
        let c = Complex::new(1.0, -2.0);
        let p = PodComplexF64::from(c);
        assert_eq!(Complex::<f64>::from(p), c);
    }

    #[test]
    fn test_pod_layout_matches_complex() {
        assert_eq!(
            std::mem::size_of::<PodComplexF64>(),
            std::mem::size_of::<Complex<f64>>()
        );
        assert_eq!(
            std::mem::align_of::<PodComplexF32>(),
            std::mem::align_of::<Complex<f32>>()
        );
    }

    #[test]
    fn test_complex_sum() {
        let a = PodComplexF32 { re: 1.0, im: 2.0 };
        let b = PodComplexF32 { re: 0.5, im: -4.0 };
        let s = a.reduce(b, ReduceOp::Sum);
        approx::assert_relative_eq!(s.re, 1.5);
        approx::assert_relative_eq!(s.im, -2.0);
        assert_eq!(
            PodComplexF64::identity(ReduceOp::Sum),
            PodComplexF64 { re: 0.0, im: 0.0 }
        );
    }
}
