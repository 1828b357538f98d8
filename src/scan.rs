//! Flat array primitives used to size and fill the refinement outputs.
//!
//! These work on plain index arrays in the compressed-row style of [`Adjacency`
//! ][crate::adjacency::Adjacency]: a sequence of counts on one side,
//! and its exclusive prefix sum ("offsets", one element longer) on the other.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Number of entries in each row of a compressed table,
/// given the table's row offsets.
pub fn get_degrees(offsets: &[usize]) -> Vec<usize> {
    #[cfg(feature = "rayon")]
    let degrees = offsets.par_windows(2).map(|w| w[1] - w[0]).collect();
    #[cfg(not(feature = "rayon"))]
    let degrees = offsets.windows(2).map(|w| w[1] - w[0]).collect();
    degrees
}

/// Exclusive prefix sum of a sequence of counts.
///
/// The result has one more element than the input,
/// starting at 0 and ending at the total count.
/// This is the inverse of [`get_degrees`].
pub fn offset_scan(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    offsets.push(0);
    offsets.extend(counts.iter().scan(0, |total, &count| {
        *total += count;
        Some(*total)
    }));
    offsets
}

/// Look up `values` at each of `indices`, i.e. compose the map `a -> b`
/// given by `indices` with the map `b -> value` given by `values`.
pub fn gather<T>(indices: &[usize], values: &[T]) -> Vec<T>
where
    T: Copy + Send + Sync,
{
    #[cfg(feature = "rayon")]
    let gathered = indices.par_iter().map(|&i| values[i]).collect();
    #[cfg(not(feature = "rayon"))]
    let gathered = indices.iter().map(|&i| values[i]).collect();
    gathered
}

/// Multiply every element of an index array by a constant factor,
/// e.g. to turn per-domain offsets into offsets of the two pairs per domain.
pub fn multiply_each_by(factor: usize, values: &[usize]) -> Vec<usize> {
    values.iter().map(|v| v * factor).collect()
}

/// Split a flat buffer into one disjoint mutable slice per row of `offsets`,
/// where each counted item takes `stride` elements of the buffer.
///
/// The buffer must be exactly `offsets.last() * stride` long.
pub fn split_by_offsets<'a, T>(
    mut data: &'a mut [T],
    offsets: &[usize],
    stride: usize,
) -> Vec<&'a mut [T]> {
    debug_assert_eq!(offsets.first(), Some(&0), "offsets must start at 0");
    debug_assert_eq!(
        data.len(),
        offsets.last().copied().unwrap_or(0) * stride,
        "buffer size doesn't match offsets"
    );
    let mut rows = Vec::with_capacity(offsets.len().saturating_sub(1));
    for w in offsets.windows(2) {
        let (row, rest) = std::mem::take(&mut data).split_at_mut((w[1] - w[0]) * stride);
        rows.push(row);
        data = rest;
    }
    rows
}

/// Run `f` once for every unit of work, passing the unit's index along.
///
/// Units are independent of each other
/// and run in parallel when the `rayon` feature is enabled.
#[cfg(feature = "rayon")]
pub fn parallel_for<U, F>(units: Vec<U>, f: F)
where
    U: Send,
    F: Fn(usize, U) + Send + Sync,
{
    units
        .into_par_iter()
        .enumerate()
        .for_each(|(i, unit)| f(i, unit));
}

/// Run `f` once for every unit of work, passing the unit's index along.
///
/// Units are independent of each other
/// and run in parallel when the `rayon` feature is enabled.
#[cfg(not(feature = "rayon"))]
pub fn parallel_for<U, F>(units: Vec<U>, f: F)
where
    F: Fn(usize, U),
{
    units
        .into_iter()
        .enumerate()
        .for_each(|(i, unit)| f(i, unit));
}
