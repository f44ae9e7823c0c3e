//! Min-sum message kernels.
//!
//! Messages are cost vectors over the states of their variable endpoint.
//! Factor to variable messages minimize over the factor's joint states, variable
//! to factor messages and beliefs are sums of factor to variable messages.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::factor::{Cost, Potential};
use crate::factor_graph::{EdgeId, EdgeSlice, Factor, Var};
use crate::index;

/// Messages from `factor` to each of its variables, in edge order, computed
/// from the current variable to factor messages.
pub(crate) fn factor_messages(
    factor: &Factor,
    from_var: &EdgeSlice<Array1<Cost>>,
) -> Vec<Array1<Cost>> {
    let incoming: Vec<ArrayView1<Cost>> = factor
        .edges
        .values()
        .map(|e| from_var[*e].view())
        .collect();
    match &factor.potential {
        Potential::Dense { table } => (0..factor.dims.len())
            .map(|pos| dense_message(table.view(), &factor.dims, &incoming, pos))
            .collect(),
        Potential::Sparse { states, costs } => {
            let minima: Vec<Cost> = incoming.iter().map(|m| min_value(*m)).collect();
            (0..factor.dims.len())
                .map(|pos| {
                    SparseMessage {
                        states: states.view(),
                        costs: costs.view(),
                        dims: &factor.dims,
                        incoming: &incoming,
                        minima: &minima,
                        pos,
                    }
                    .compute()
                })
                .collect()
        }
    }
}

/// Reference computation: enumerate every joint state of the factor.
pub(crate) fn dense_message(
    table: ArrayView1<Cost>,
    dims: &[usize],
    incoming: &[ArrayView1<Cost>],
    pos: usize,
) -> Array1<Cost> {
    let mut msg = Array1::from_elem(dims[pos], Cost::INFINITY);
    let mut sub = vec![0; dims.len()];
    for (idx, cost) in table.iter().enumerate() {
        index::fill_subscripts(idx, dims, &mut sub);
        let mut sum = *cost;
        for (i, (m, s)) in incoming.iter().zip(sub.iter()).enumerate() {
            if i != pos {
                sum += m[*s];
            }
        }
        let d = sub[pos];
        msg[d] = msg[d].min(sum);
    }
    msg
}

fn min_value(msg: ArrayView1<Cost>) -> Cost {
    msg.fold(Cost::INFINITY, |acc, x| acc.min(*x))
}

/// Factor to variable message for a sparse potential.
///
/// Joint states are explored by fixing the factor's variables one position at a
/// time. As soon as no special state agrees with the fixed prefix, every
/// completion of the prefix costs 0 and the free positions are minimized
/// independently using the per-message minima. Only prefixes of special states
/// are expanded, so the work is bounded by `nz_states * sum(dims)` instead of
/// `prod(dims)`.
struct SparseMessage<'a> {
    /// (nz_states, arity)
    states: ArrayView2<'a, usize>,
    costs: ArrayView1<'a, Cost>,
    dims: &'a [usize],
    incoming: &'a [ArrayView1<'a, Cost>],
    minima: &'a [Cost],
    /// Position of the destination variable in the factor.
    pos: usize,
}

impl SparseMessage<'_> {
    fn compute(&self) -> Array1<Cost> {
        let mut msg = Array1::from_elem(self.dims[self.pos], Cost::INFINITY);
        let mut prefix = vec![0; self.dims.len()];
        let candidates: Vec<usize> = (0..self.states.nrows()).collect();
        self.expand(&mut msg, &mut prefix, 0, &candidates);
        msg
    }

    /// `candidates` are the special states (in increasing order) matching
    /// `prefix[..depth]`.
    fn expand(
        &self,
        msg: &mut Array1<Cost>,
        prefix: &mut [usize],
        depth: usize,
        candidates: &[usize],
    ) {
        if candidates.is_empty() {
            self.update_non_special(msg, prefix, depth);
        } else if depth == self.dims.len() {
            // Full joint state, equal to every candidate: the first one is its
            // special state.
            let sum = self.exact_sum(self.costs[candidates[0]], prefix);
            let d = prefix[self.pos];
            msg[d] = msg[d].min(sum);
        } else {
            let mut next = Vec::with_capacity(candidates.len());
            for value in 0..self.dims[depth] {
                next.clear();
                next.extend(
                    candidates
                        .iter()
                        .copied()
                        .filter(|c| self.states[(*c, depth)] == value),
                );
                prefix[depth] = value;
                self.expand(msg, prefix, depth + 1, &next);
            }
        }
    }

    /// All completions of `prefix[..depth]` are non-special (cost 0).
    fn update_non_special(&self, msg: &mut Array1<Cost>, prefix: &[usize], depth: usize) {
        let mut sum: Cost = 0.0;
        for i in 0..self.dims.len() {
            if i != self.pos {
                sum += if i < depth {
                    self.incoming[i][prefix[i]]
                } else {
                    self.minima[i]
                };
            }
        }
        if self.pos < depth {
            let d = prefix[self.pos];
            msg[d] = msg[d].min(sum);
        } else {
            msg.mapv_inplace(|x| x.min(sum));
        }
    }

    fn exact_sum(&self, cost: Cost, state: &[usize]) -> Cost {
        let mut sum = cost;
        for (i, (m, s)) in self.incoming.iter().zip(state.iter()).enumerate() {
            if i != self.pos {
                sum += m[*s];
            }
        }
        sum
    }
}

/// Message from `var` along `edge`: sum of the messages from all other factors.
pub(crate) fn var_message(
    var: &Var,
    edge: EdgeId,
    to_var: &EdgeSlice<Array1<Cost>>,
) -> Array1<Cost> {
    let mut msg = Array1::zeros(var.dim);
    for e in var.edges.values() {
        if *e != edge {
            msg += &to_var[*e];
        }
    }
    msg
}

/// Sum of the messages from all factors of `var`.
pub(crate) fn belief(var: &Var, to_var: &EdgeSlice<Array1<Cost>>) -> Array1<Cost> {
    let mut belief = Array1::zeros(var.dim);
    for e in var.edges.values() {
        belief += &to_var[*e];
    }
    belief
}

/// Lowest state with the strictly smallest belief.
pub(crate) fn arg_min(belief: ArrayView1<Cost>) -> usize {
    let mut min_idx = 0;
    let mut min_val = Cost::INFINITY;
    for (d, b) in belief.iter().enumerate() {
        if *b < min_val {
            min_val = *b;
            min_idx = d;
        }
    }
    min_idx
}

/// Subtract the mean of the message from each of its values.
pub(crate) fn normalize(msg: &mut Array1<Cost>) {
    if let Some(mean) = msg.mean() {
        msg.mapv_inplace(|x| x - mean);
    }
}
