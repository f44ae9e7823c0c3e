//! Constructors for common pairwise cost tables.
//!
//! Tables are laid out for a factor over `[a, b]`: the state of `a` varies
//! fastest.

use itertools::{iproduct, Itertools};

use crate::factor::{Cost, SpecialState};

/// Dense table of `f(state_a, state_b)` for a factor over `[a, b]`.
pub fn pairwise_table<F>(n_a: usize, n_b: usize, f: F) -> Vec<Cost>
where
    F: Fn(usize, usize) -> Cost,
{
    iproduct!(0..n_b, 0..n_a).map(|(b, a)| f(a, b)).collect()
}

/// Potts model: `penalty` when the two labels differ, 0 otherwise.
pub fn potts(n: usize, penalty: Cost) -> Vec<Cost> {
    pairwise_table(n, n, |a, b| if a == b { 0.0 } else { penalty })
}

/// Truncated L1 distance `weight * min(|values_a[a] - values_b[b]|, clip)`
/// between the values attached to the labels of each variable.
pub fn truncated_linear(
    values_a: &[Cost],
    values_b: &[Cost],
    weight: Cost,
    clip: Cost,
) -> Vec<Cost> {
    pairwise_table(values_a.len(), values_b.len(), |a, b| {
        weight * (values_a[a] - values_b[b]).abs().min(clip)
    })
}

/// Sparse form of a Potts model: `-bonus` on the diagonal, 0 elsewhere.
///
/// This is [`potts`] with `penalty == bonus` shifted down by `bonus`, hence the
/// same minimizers with energies lower by `bonus` per factor.
pub fn sparse_potts(n: usize, bonus: Cost) -> Vec<SpecialState> {
    (0..n)
        .map(|s| SpecialState::new(vec![s, s], -bonus))
        .collect_vec()
}
