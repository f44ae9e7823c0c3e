//! Mixed-radix codec between linear state indices and per-variable subscripts.
//!
//! Position 0 is the fastest-varying digit: for `dims = [2, 3]` the linear
//! indices `0, 1, 2, ...` decode to `(0,0), (1,0), (0,1), (1,1), (0,2), ...`.
//! Dense cost tables and the brute-force enumeration both use this order.

use crate::{MinSumError, Result};

/// Number of joint states of variables with cardinalities `dims`, or `None`
/// if the product does not fit in a `u64`.
pub fn domain_size(dims: &[usize]) -> Option<u64> {
    dims.iter()
        .try_fold(1u64, |acc, d| acc.checked_mul(*d as u64))
}

/// Decode `index` into `sub` (which must have the same length as `dims`).
///
/// This is the allocation-free form used in hot loops; callers guarantee that
/// `index` is in range.
#[inline]
pub(crate) fn fill_subscripts(mut index: usize, dims: &[usize], sub: &mut [usize]) {
    debug_assert_eq!(dims.len(), sub.len());
    for (s, d) in sub.iter_mut().zip(dims.iter()) {
        *s = index % d;
        index /= d;
    }
}

/// Decode a linear index into one digit per position.
pub fn to_subscripts(index: usize, dims: &[usize]) -> Result<Vec<usize>> {
    match domain_size(dims) {
        Some(size) if (index as u64) < size => {
            let mut sub = vec![0; dims.len()];
            fill_subscripts(index, dims, &mut sub);
            Ok(sub)
        }
        size => Err(MinSumError::IndexOutOfRange { index, size }),
    }
}

/// Encode subscripts into a linear index. Inverse of [`to_subscripts`].
///
/// Subscripts are not range-checked: the caller is expected to pass digits
/// smaller than the matching entry of `dims`.
#[inline]
pub fn to_index(sub: &[usize], dims: &[usize]) -> usize {
    debug_assert_eq!(dims.len(), sub.len());
    sub.iter()
        .zip(dims.iter())
        .rev()
        .fold(0, |idx, (s, d)| idx * d + s)
}
