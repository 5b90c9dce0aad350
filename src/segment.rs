//! Partial transfers of a packed stream.
//!
//! A message larger than one buffer is moved in segments: each call handles
//! the packed bytes `[offset, offset + len)` of the full stream of `count`
//! instances. Whole instances inside the window go through the selected
//! kernel; the partial instances at either edge are walked element by
//! element.

use pup_kernel::{Formula, Operation};
use pup_layout::{Datatype, PupError, Result};
use pup_traits::ReduceOp;

use crate::ops::{shared, Engine};

/// Element window `[first, last)` of the packed stream plus the described
/// buffer length (in bytes) it reaches into.
struct Window {
    first: usize,
    last: usize,
    described: usize,
}

fn window(count: usize, dt: &Datatype, offset: usize, len: usize) -> Result<Option<Window>> {
    let size = dt.basic_type().size();
    if offset % size != 0 {
        return Err(PupError::Unaligned {
            what: "segment offset",
            value: offset as isize,
            elem_size: size,
        });
    }
    let n = dt.num_elements();
    let total = dt.packed_len(count)?;
    let first = offset / size;
    let last = (first + len / size).min(total);
    if n == 0 || first >= last {
        return Ok(None);
    }
    let instances = last.div_ceil(n);
    let described = dt
        .described_len(instances)?
        .checked_mul(size)
        .ok_or(PupError::OffsetOverflow)?;
    Ok(Some(Window {
        first,
        last,
        described,
    }))
}

/// Move elements `lo..hi` of instance `instance` one at a time.
///
/// `f` receives the packed element index and the described element offset.
fn partial_instance<F: FnMut(usize, usize)>(
    dt: &Datatype,
    instance: usize,
    lo: usize,
    hi: usize,
    mut f: F,
) {
    let n = dt.num_elements();
    let base = instance as isize * dt.extent() as isize;
    let mut idx = 0usize;
    Formula::build(dt).for_each_offset(1, |off| {
        if (lo..hi).contains(&idx) {
            f(instance * n + idx, (base + off) as usize);
        }
        idx += 1;
    });
}

fn check_len(buf: usize, needed: usize) -> Result<()> {
    if buf < needed {
        return Err(PupError::BufferTooSmall { needed, got: buf });
    }
    Ok(())
}

impl Engine {
    /// Pack the packed-stream bytes `[offset, offset + dst.len())` of `count`
    /// instances of `dt`, rounded down to whole elements.
    ///
    /// Returns the number of bytes written to the front of `dst`.
    pub fn pack_segment(
        &self,
        src: &[u8],
        count: usize,
        dt: &Datatype,
        offset: usize,
        dst: &mut [u8],
    ) -> Result<usize> {
        let Some(w) = window(count, dt, offset, dst.len())? else {
            return Ok(0);
        };
        check_len(src.len(), w.described)?;
        let size = dt.basic_type().size();
        let written = (w.last - w.first) * size;
        if dt.is_contig() {
            let start = w.first * size;
            dst[..written].copy_from_slice(&src[start..start + written]);
            return Ok(written);
        }

        let n = dt.num_elements();
        let ext_bytes = dt.extent_bytes();
        let mut done = w.first;
        while done < w.last {
            let instance = done / n;
            let within = done % n;
            let full = (w.last - done) / n;
            let out = (done - w.first) * size;
            if within == 0 && full > 0 {
                let handle = self.handle(dt, Operation::Pack)?;
                handle.invoke(&src[instance * ext_bytes..], &mut dst[out..], full, dt)?;
                done += full * n;
            } else {
                let hi = (w.last - instance * n).min(n);
                partial_instance(dt, instance, within, hi, |idx, at| {
                    let o = (idx - w.first) * size;
                    let a = at * size;
                    dst[o..o + size].copy_from_slice(&src[a..a + size]);
                });
                done = instance * n + hi;
            }
        }
        Ok(written)
    }

    /// Unpack `src`, the packed-stream bytes starting at `offset`, into the
    /// described buffer `dst`, rounded down to whole elements.
    ///
    /// Returns the number of bytes consumed from `src`.
    pub fn unpack_segment(
        &self,
        src: &[u8],
        dst: &mut [u8],
        count: usize,
        dt: &Datatype,
        offset: usize,
    ) -> Result<usize> {
        self.scatter_segment(src, dst, count, dt, offset, Operation::Unpack)
    }

    /// [`Engine::unpack_segment`] that combines each element into `dst`
    /// through `op` instead of overwriting it.
    pub fn acc_unpack_segment(
        &self,
        src: &[u8],
        dst: &mut [u8],
        count: usize,
        dt: &Datatype,
        offset: usize,
        op: ReduceOp,
    ) -> Result<usize> {
        self.scatter_segment(src, dst, count, dt, offset, Operation::AccumulateUnpack(op))
    }

    fn scatter_segment(
        &self,
        src: &[u8],
        dst: &mut [u8],
        count: usize,
        dt: &Datatype,
        offset: usize,
        operation: Operation,
    ) -> Result<usize> {
        let Some(w) = window(count, dt, offset, src.len())? else {
            return Ok(0);
        };
        check_len(dst.len(), w.described)?;
        let size = dt.basic_type().size();
        let consumed = (w.last - w.first) * size;

        // Edge elements (and dense layouts) run through the bare element.
        let leaf = Datatype::basic(dt.basic_type());
        let element = self.handle(&leaf, operation)?;
        if dt.is_contig() {
            let start = w.first * size;
            element.invoke(
                &src[..consumed],
                &mut dst[start..start + consumed],
                w.last - w.first,
                &leaf,
            )?;
            return Ok(consumed);
        }

        let n = dt.num_elements();
        let ext_bytes = dt.extent_bytes();
        let mut done = w.first;
        while done < w.last {
            let instance = done / n;
            let within = done % n;
            let full = (w.last - done) / n;
            let input = (done - w.first) * size;
            if within == 0 && full > 0 {
                let handle = self.handle(dt, operation)?;
                handle.invoke(&src[input..], &mut dst[instance * ext_bytes..], full, dt)?;
                done += full * n;
            } else {
                let hi = (w.last - instance * n).min(n);
                let mut status = Ok(());
                partial_instance(dt, instance, within, hi, |idx, at| {
                    if status.is_ok() {
                        let i = (idx - w.first) * size;
                        let a = at * size;
                        status = element.invoke(&src[i..i + size], &mut dst[a..a + size], 1, &leaf);
                    }
                });
                status?;
                done = instance * n + hi;
            }
        }
        Ok(consumed)
    }
}

/// [`Engine::pack_segment`] with the default policy.
pub fn pack_segment(
    src: &[u8],
    count: usize,
    dt: &Datatype,
    offset: usize,
    dst: &mut [u8],
) -> Result<usize> {
    shared().pack_segment(src, count, dt, offset, dst)
}

/// [`Engine::unpack_segment`] with the default policy.
pub fn unpack_segment(
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
    offset: usize,
) -> Result<usize> {
    shared().unpack_segment(src, dst, count, dt, offset)
}

/// [`Engine::acc_unpack_segment`] with the default policy.
pub fn acc_unpack_segment(
    src: &[u8],
    dst: &mut [u8],
    count: usize,
    dt: &Datatype,
    offset: usize,
    op: ReduceOp,
) -> Result<usize> {
    shared().acc_unpack_segment(src, dst, count, dt, offset, op)
}
