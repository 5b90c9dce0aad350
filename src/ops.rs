use std::sync::OnceLock;

use pup_kernel::{DispatchConfig, Dispatcher, KernelHandle, Operation};
use pup_layout::{Datatype, PupError, Result};
use pup_traits::ReduceOp;
use tracing::trace;

/// Pack/unpack frontend bound to one dispatch policy.
///
/// The free functions ([`pack`], [`unpack`], ...) use a shared engine with
/// the default policy; build an `Engine` to choose another.
#[derive(Clone, Default)]
pub struct Engine {
    dispatcher: Dispatcher,
}

impl Engine {
    pub fn new(config: DispatchConfig) -> Self {
        Engine {
            dispatcher: Dispatcher::new(config),
        }
    }

    /// Engine configured from `STRIDED_PUP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Engine::new(DispatchConfig::from_env()?))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn handle(&self, dt: &Datatype, operation: Operation) -> Result<KernelHandle> {
        self.dispatcher.select(dt, operation)
    }

    /// Gather `count` instances of `dt` from `src` into the front of `dst`.
    ///
    /// Returns the number of packed bytes written.
    pub fn pack(&self, src: &[u8], count: usize, dt: &Datatype, dst: &mut [u8]) -> Result<usize> {
        let bytes = packed_bytes(count, dt)?;
        if bytes == 0 {
            return Ok(0);
        }
        if dt.is_contig() {
            copy_run(src, dst, bytes)?;
        } else {
            self.handle(dt, Operation::Pack)?.invoke(src, dst, count, dt)?;
        }
        Ok(bytes)
    }

    /// Scatter `count` packed instances of `dt` from `src` into `dst`.
    ///
    /// Returns the number of packed bytes consumed.
    pub fn unpack(&self, src: &[u8], dst: &mut [u8], count: usize, dt: &Datatype) -> Result<usize> {
        let bytes = packed_bytes(count, dt)?;
        if bytes == 0 {
            return Ok(0);
        }
        if dt.is_contig() {
            copy_run(src, dst, bytes)?;
        } else {
            self.handle(dt, Operation::Unpack)?.invoke(src, dst, count, dt)?;
        }
        Ok(bytes)
    }

    /// Scatter `count` packed instances of `dt`, combining each element with
    /// the value already in `dst` through `op`.
    ///
    /// `dst` is never cleared first; start from [`pup_traits::Reducible::identity`]
    /// values for a plain reduction.
    pub fn acc_unpack(
        &self,
        src: &[u8],
        dst: &mut [u8],
        count: usize,
        dt: &Datatype,
        op: ReduceOp,
    ) -> Result<usize> {
        let bytes = packed_bytes(count, dt)?;
        if bytes == 0 {
            return Ok(0);
        }
        self.handle(dt, Operation::AccumulateUnpack(op))?
            .invoke(src, dst, count, dt)?;
        Ok(bytes)
    }
}

fn packed_bytes(count: usize, dt: &Datatype) -> Result<usize> {
    count
        .checked_mul(dt.size_bytes())
        .ok_or(PupError::OffsetOverflow)
}

fn copy_run(src: &[u8], dst: &mut [u8], bytes: usize) -> Result<()> {
    let src = src.get(..bytes).ok_or(PupError::BufferTooSmall {
        needed: bytes,
        got: src.len(),
    })?;
    let got = dst.len();
    let dst = dst
        .get_mut(..bytes)
        .ok_or(PupError::BufferTooSmall { needed: bytes, got })?;
    trace!(bytes, "contiguous layout, plain copy");
    dst.copy_from_slice(src);
    Ok(())
}

pub(crate) fn shared() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(Engine::default)
}

/// [`Engine::pack`] with the default policy.
pub fn pack(src: &[u8], count: usize, dt: &Datatype, dst: &mut [u8]) -> Result<usize> {
    shared().pack(src, count, dt, dst)
}

/// [`Engine::unpack`] with the default policy.
pub fn unpack(src: &[u8], dst: &mut [u8], count: usize, dt: &Datatype) -> Result<usize> {
    shared().unpack(src, dst, count, dt)
}

/// [`Engine::acc_unpack`] with the default policy.
pub fn acc_unpack(
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
    op: ReduceOp,
) -> Result<usize> {
    shared().acc_unpack(src, dst, count, dt, op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_layout::BasicType;

    #[test]
    fn test_zero_count_moves_nothing() {
        let dt = Datatype::vector(3, 2, 5, &Datatype::basic(BasicType::Int32)).unwrap();
        assert_eq!(pack(&[], 0, &dt, &mut []).unwrap(), 0);
        assert_eq!(unpack(&[], &mut [], 0, &dt).unwrap(), 0);
    }

    #[test]
    fn test_contig_fast_path() {
        let dt = Datatype::contiguous(4, &Datatype::basic(BasicType::Int16)).unwrap();
        let src: Vec<u8> = (0..16).collect();
        let mut dst = vec![0u8; 16];
        assert_eq!(pack(&src, 2, &dt, &mut dst).unwrap(), 16);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_contig_fast_path_checks_sizes() {
        let dt = Datatype::contiguous(4, &Datatype::basic(BasicType::Int16)).unwrap();
        let err = pack(&[0; 8], 2, &dt, &mut [0; 16]).unwrap_err();
        assert!(matches!(err, PupError::BufferTooSmall { needed: 16, got: 8 }));
    }

    #[test]
    fn test_bool_accumulate_rejected() {
        let dt = Datatype::contiguous(2, &Datatype::basic(BasicType::Bool)).unwrap();
        let err = acc_unpack(&[1, 0], &mut [0, 0], 1, &dt, ReduceOp::Sum).unwrap_err();
        assert!(matches!(err, PupError::NotArithmetic(BasicType::Bool)));
    }
}
