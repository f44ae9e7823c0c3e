//! Total cost of a full labeling.

use crate::factor::Cost;
use crate::factor_graph::{FactorGraph, GraphBuildError};

impl FactorGraph {
    /// Check that `labels` has one in-range label per variable.
    pub fn check_assignment(&self, labels: &[usize]) -> Result<(), GraphBuildError> {
        if labels.len() != self.n_vars() {
            return Err(GraphBuildError::AssignmentLength {
                got: labels.len(),
                expected: self.n_vars(),
            });
        }
        for (var, (label, v)) in labels.iter().zip(self.vars.iter()).enumerate() {
            if *label >= v.dim {
                return Err(GraphBuildError::LabelOutOfRange {
                    var,
                    label: *label,
                    dim: v.dim,
                });
            }
        }
        Ok(())
    }

    /// Sum over factors of the factor cost at the labels of its variables.
    pub fn energy(&self, labels: &[usize]) -> Result<Cost, GraphBuildError> {
        self.check_assignment(labels)?;
        Ok(self.energy_with(labels, &mut Vec::new()))
    }

    /// Unchecked energy, `scratch` is reused to project the labeling onto each
    /// factor.
    pub(crate) fn energy_with(&self, labels: &[usize], scratch: &mut Vec<usize>) -> Cost {
        self.factors.iter().fold(0.0, |acc, factor| {
            scratch.clear();
            scratch.extend(factor.edges.keys().map(|var| labels[*var]));
            acc + factor.potential.cost(&factor.dims, scratch)
        })
    }
}
