//! Shared traits for the strided-pup crates.
//!
//! This crate provides the element bounds shared by `pup-kernel` and the
//! `strided-pup` frontend.
//!
//! - [`Element`]: a basic element that can be moved bit-for-bit
//! - [`Reducible`]: an element that admits a [`ReduceOp`]
//! - [`PodComplexF32`] / [`PodComplexF64`]: POD views of `Complex<T>`

pub mod element;
pub mod pod_complex;

pub use element::{Element, ReduceOp, Reducible};
pub use pod_complex::{PodComplexF32, PodComplexF64};
