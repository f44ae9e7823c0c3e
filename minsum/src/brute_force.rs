//! Exhaustive minimum-energy search, for validation on small problems.

use log::info;
use rayon::prelude::*;

use crate::factor::Cost;
use crate::factor_graph::FactorGraph;
use crate::index;
use crate::progress;
use crate::{Config, MinSumError, Result, Solution};

/// Number of consecutive joint states scored by one task.
const BLOCK_SIZE: usize = 4096;

/// Lowest-energy labeling over all joint states.
///
/// Ties are resolved in favor of the labeling with the smallest linear index.
pub fn solve(graph: &FactorGraph, config: &Config) -> Result<Solution> {
    let dims = graph.cardinalities();
    let limit = config.max_exact_states();
    let n_states = index::domain_size(&dims)
        .filter(|n| *n <= limit)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(MinSumError::TooManyStates {
            n_states: index::domain_size(&dims),
            limit,
        })?;
    info!(
        "Exhaustive search over {} joint states of {} variables.",
        n_states,
        dims.len()
    );
    let n_blocks = n_states.div_ceil(BLOCK_SIZE);
    let best = progress::with_progress(
        |progress| {
            (0..n_blocks)
                .into_par_iter()
                .map(|block| {
                    let res = best_in_range(
                        graph,
                        &dims,
                        block * BLOCK_SIZE..n_states.min((block + 1) * BLOCK_SIZE),
                    );
                    progress.record_energy(res.0);
                    progress.inc();
                    res
                })
                .reduce_with(|a, b| if b.0 < a.0 { b } else { a })
        },
        n_blocks as u64,
        "Exhaustive search",
        config,
    );
    // n_states >= 1 (empty product for an empty graph), hence there is a block.
    let (energy, best_idx) = best.unwrap_or((0.0, 0));
    let mut labels = vec![0; dims.len()];
    index::fill_subscripts(best_idx, &dims, &mut labels);
    info!("Exhaustive search: minimum energy {:.3}", energy);
    Ok(Solution { labels, energy })
}

fn best_in_range(
    graph: &FactorGraph,
    dims: &[usize],
    range: std::ops::Range<usize>,
) -> (Cost, usize) {
    let mut labels = vec![0; dims.len()];
    let mut scratch = Vec::new();
    let mut best = (Cost::INFINITY, range.start);
    for idx in range {
        index::fill_subscripts(idx, dims, &mut labels);
        let energy = graph.energy_with(&labels, &mut scratch);
        if energy < best.0 {
            best = (energy, idx);
        }
    }
    best
}
