use crate::PermsetError;
use std::ops::Range;

/// Lazy sequence of `k` contiguous ranges covering `0..n`
#[derive(Debug, Clone)]
pub struct Chunks {
    n: u64,
    chunk_size: u64,
    remainder: u64,
    remaining: u64,
    start: u64,
}

/// Divide `n` into `nchunks` near-equal half-open ranges.
///
/// The first `n % nchunks` ranges are one element longer. `n == 0` yields a
/// single empty range; when `nchunks > n` the trailing ranges are empty so
/// exactly `nchunks` ranges are always produced.
pub fn chunk(n: u64, nchunks: u64) -> Result<Chunks, PermsetError> {
    if nchunks == 0 {
        return Err(PermsetError::InvalidArgument(
            "number of chunks must be at least 1".to_string(),
        ));
    }
    let (chunk_size, remainder) = (n / nchunks, n % nchunks);
    let remaining = if n == 0 { 1 } else { nchunks };
    Ok(Chunks {
        n,
        chunk_size,
        remainder,
        remaining,
        start: 0,
    })
}

impl Iterator for Chunks {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let mut end = self.start + self.chunk_size;
        if self.remainder > 0 {
            end += 1;
            self.remainder -= 1;
        }
        self.remaining -= 1;
        let range = self.start..end;
        self.start = end;
        if self.remaining == 0 {
            debug_assert_eq!(end, self.n);
        }
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remaining as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Chunks {}
