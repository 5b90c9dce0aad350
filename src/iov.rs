//! Contiguous byte runs of a described layout.

use pup_kernel::Formula;
use pup_layout::{Datatype, PupError, Result};

/// One contiguous run of bytes in a described buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IovEntry {
    /// Byte offset from the buffer start.
    pub offset: isize,
    /// Length in bytes.
    pub len: usize,
}

/// Walk the maximal runs of `count` instances of `dt` in traversal order.
///
/// Elements that directly follow the previous one are merged into its run.
fn for_each_run<F: FnMut(IovEntry)>(count: usize, dt: &Datatype, mut f: F) -> Result<()> {
    let size = dt.basic_type().size();
    if count == 0 || dt.num_elements() == 0 {
        return Ok(());
    }
    if dt.is_contig() {
        let len = count
            .checked_mul(dt.size_bytes())
            .ok_or(PupError::OffsetOverflow)?;
        f(IovEntry { offset: 0, len });
        return Ok(());
    }

    let mut current: Option<IovEntry> = None;
    Formula::build(dt).for_each_offset(count, |off| {
        let at = off * size as isize;
        if let Some(run) = current.as_mut() {
            if run.offset + run.len as isize == at {
                run.len += size;
                return;
            }
        }
        if let Some(run) = current.replace(IovEntry { offset: at, len: size }) {
            f(run);
        }
    });
    if let Some(run) = current {
        f(run);
    }
    Ok(())
}

/// Number of contiguous runs in `count` instances of `dt`.
pub fn iov_len(count: usize, dt: &Datatype) -> Result<usize> {
    let mut n = 0;
    for_each_run(count, dt, |_| n += 1)?;
    Ok(n)
}

/// The contiguous runs of `count` instances of `dt`, in traversal order.
pub fn iov(count: usize, dt: &Datatype) -> Result<Vec<IovEntry>> {
    let mut runs = Vec::new();
    for_each_run(count, dt, |run| runs.push(run))?;
    Ok(runs)
}

/// At most `max_len` runs of `count` instances of `dt`, skipping the first
/// `first` runs.
///
/// Consecutive calls with `first` advanced by the number of runs returned
/// walk the same list [`iov`] produces, a bounded batch at a time.
pub fn iov_range(
    count: usize,
    dt: &Datatype,
    first: usize,
    max_len: usize,
) -> Result<Vec<IovEntry>> {
    let mut runs = Vec::new();
    if max_len == 0 {
        return Ok(runs);
    }
    let mut index = 0usize;
    for_each_run(count, dt, |run| {
        if index >= first && runs.len() < max_len {
            runs.push(run);
        }
        index += 1;
    })?;
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pup_layout::BasicType;

    fn entry(offset: isize, len: usize) -> IovEntry {
        IovEntry { offset, len }
    }

    #[test]
    fn test_strided_runs() {
        let dt = Datatype::vector(3, 2, 5, &Datatype::basic(BasicType::Int32)).unwrap();
        assert_eq!(
            iov(1, &dt).unwrap(),
            vec![entry(0, 8), entry(20, 8), entry(40, 8)]
        );
        // the last block of one instance touches the first of the next
        assert_eq!(iov_len(2, &dt).unwrap(), 5);
    }

    #[test]
    fn test_contig_is_single_run() {
        let dt = Datatype::contiguous(4, &Datatype::basic(BasicType::Double)).unwrap();
        assert_eq!(iov(3, &dt).unwrap(), vec![entry(0, 96)]);
        assert_eq!(iov_len(0, &dt).unwrap(), 0);
    }

    #[test]
    fn test_indexed_runs_keep_order() {
        let dt = Datatype::hindexed(3, &[1, 2, 1], &[8, 0, 12], &Datatype::basic(BasicType::Int32))
            .unwrap();
        assert_eq!(
            iov(1, &dt).unwrap(),
            vec![entry(8, 4), entry(0, 8), entry(12, 4)]
        );
    }

    #[test]
    fn test_range_batches_cover_full_list() {
        let dt = Datatype::vector(3, 2, 5, &Datatype::basic(BasicType::Int32)).unwrap();
        let all = iov(2, &dt).unwrap();
        assert_eq!(all.len(), 5);

        let mut batches = Vec::new();
        let mut first = 0;
        loop {
            let batch = iov_range(2, &dt, first, 2).unwrap();
            if batch.is_empty() {
                break;
            }
            assert!(batch.len() <= 2);
            first += batch.len();
            batches.extend(batch);
        }
        assert_eq!(batches, all);
    }

    #[test]
    fn test_range_past_end_and_zero_cap() {
        let dt = Datatype::vector(3, 2, 5, &Datatype::basic(BasicType::Int32)).unwrap();
        assert_eq!(iov_range(1, &dt, 1, 1).unwrap(), vec![entry(20, 8)]);
        assert!(iov_range(1, &dt, 3, 4).unwrap().is_empty());
        assert!(iov_range(1, &dt, 0, 0).unwrap().is_empty());
    }
}
