//! Splitting the cell range across workers.

use std::ops::Range;

/// Balanced block partition of `0..cells` into `workers` contiguous ranges.
///
/// The first `cells % workers` ranges hold `⌈cells / workers⌉` cells, the
/// rest `⌊cells / workers⌋`.  Ranges are disjoint, in ascending order, and
/// cover `0..cells` exactly once; when there are more workers than cells the
/// trailing ranges are empty.  Returns no ranges for zero workers.
pub fn partition(cells: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 {
        return Vec::new();
    }
    let base = cells / workers;
    let extra = cells % workers;

    let mut start = 0;
    (0..workers)
        .map(|w| {
            let len = base + usize::from(w < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}
