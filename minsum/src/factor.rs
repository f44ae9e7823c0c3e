//! Factor descriptions and their compiled cost representations.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::factor_graph::{FactorId, GraphBuildError};
use crate::index;

pub type Cost = f64;

/// A joint state of a sparse factor with an explicit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialState {
    /// One value per variable of the factor, in the factor's variable order.
    pub assignment: Vec<usize>,
    pub cost: Cost,
}

impl SpecialState {
    pub fn new(assignment: Vec<usize>, cost: Cost) -> Self {
        Self { assignment, cost }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PotentialSpec {
    /// Full cost table indexed by [`index::to_index`] over the variable
    /// cardinalities (first variable varies fastest).
    Dense(Vec<Cost>),
    /// Explicitly costed states, all other joint states cost 0.
    Sparse(Vec<SpecialState>),
}

/// Cost function over an ordered tuple of distinct variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFactorSpec", into = "RawFactorSpec")]
pub struct FactorSpec {
    pub variables: Vec<usize>,
    pub potential: PotentialSpec,
}

/// Wire form: exactly one of `costs` and `special_states` must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFactorSpec {
    variables: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    costs: Option<Vec<Cost>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    special_states: Option<Vec<SpecialState>>,
}

impl TryFrom<RawFactorSpec> for FactorSpec {
    type Error = GraphBuildError;
    fn try_from(raw: RawFactorSpec) -> Result<Self, Self::Error> {
        let potential = match (raw.costs, raw.special_states) {
            (Some(costs), None) => PotentialSpec::Dense(costs),
            (None, Some(states)) => PotentialSpec::Sparse(states),
            (Some(_), Some(_)) => return Err(GraphBuildError::MixedRepresentation),
            (None, None) => return Err(GraphBuildError::MissingPotential),
        };
        Ok(Self {
            variables: raw.variables,
            potential,
        })
    }
}

impl From<FactorSpec> for RawFactorSpec {
    fn from(spec: FactorSpec) -> Self {
        let (costs, special_states) = match spec.potential {
            PotentialSpec::Dense(costs) => (Some(costs), None),
            PotentialSpec::Sparse(states) => (None, Some(states)),
        };
        Self {
            variables: spec.variables,
            costs,
            special_states,
        }
    }
}

impl FactorSpec {
    pub fn dense(variables: Vec<usize>, costs: Vec<Cost>) -> Self {
        Self {
            variables,
            potential: PotentialSpec::Dense(costs),
        }
    }
    pub fn sparse(variables: Vec<usize>, special_states: Vec<SpecialState>) -> Self {
        Self {
            variables,
            potential: PotentialSpec::Sparse(special_states),
        }
    }
    pub fn is_sparse(&self) -> bool {
        matches!(self.potential, PotentialSpec::Sparse(_))
    }
    /// Equivalent dense factor. `cardinalities` are those of the whole problem.
    ///
    /// The factor is validated first, with `factor` used in error reports.
    pub fn densify(
        &self,
        factor: FactorId,
        cardinalities: &[usize],
    ) -> Result<Self, GraphBuildError> {
        let dims = factor_dims(factor, &self.variables, cardinalities)?;
        let potential = Potential::compile(&self.potential, factor, &dims)?;
        let size = index::domain_size(&dims)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or(GraphBuildError::DomainOverflow { factor })?;
        let mut state = vec![0; dims.len()];
        let costs = (0..size)
            .map(|idx| {
                index::fill_subscripts(idx, &dims, &mut state);
                potential.cost(&dims, &state)
            })
            .collect();
        Ok(Self::dense(self.variables.clone(), costs))
    }
}

/// Cardinalities of `variables`, checking that they exist and are distinct.
pub(crate) fn factor_dims(
    factor: FactorId,
    variables: &[usize],
    cardinalities: &[usize],
) -> Result<Vec<usize>, GraphBuildError> {
    if variables.is_empty() {
        return Err(GraphBuildError::EmptyFactor { factor });
    }
    variables
        .iter()
        .enumerate()
        .map(|(pos, var)| {
            if variables[..pos].contains(var) {
                Err(GraphBuildError::RepeatedVar { factor, var: *var })
            } else {
                cardinalities
                    .get(*var)
                    .copied()
                    .ok_or(GraphBuildError::UnknownVar {
                        factor,
                        var: *var,
                        n_vars: cardinalities.len(),
                    })
            }
        })
        .collect()
}

/// Validated cost function of a factor in the graph.
#[derive(Debug, Clone)]
pub(crate) enum Potential {
    Dense {
        table: Array1<Cost>,
    },
    Sparse {
        /// (nz_states, arity), one special state per row
        states: Array2<usize>,
        /// (nz_states,)
        costs: Array1<Cost>,
    },
}

impl Potential {
    pub(crate) fn compile(
        spec: &PotentialSpec,
        factor: FactorId,
        dims: &[usize],
    ) -> Result<Self, GraphBuildError> {
        match spec {
            PotentialSpec::Dense(costs) => {
                let expected = index::domain_size(dims);
                if expected != Some(costs.len() as u64) {
                    return Err(GraphBuildError::TableSize {
                        factor,
                        got: costs.len(),
                        expected,
                    });
                }
                if costs.iter().any(|c| !c.is_finite()) {
                    return Err(GraphBuildError::NonFiniteCost { factor });
                }
                Ok(Potential::Dense {
                    table: Array1::from(costs.clone()),
                })
            }
            PotentialSpec::Sparse(special_states) => {
                let mut states = Array2::zeros((special_states.len(), dims.len()));
                for (state_id, (special, mut row)) in special_states
                    .iter()
                    .zip(states.outer_iter_mut())
                    .enumerate()
                {
                    if special.assignment.len() != dims.len() {
                        return Err(GraphBuildError::SpecialStateArity {
                            factor,
                            state: state_id,
                            got: special.assignment.len(),
                            expected: dims.len(),
                        });
                    }
                    if !special.cost.is_finite() {
                        return Err(GraphBuildError::NonFiniteCost { factor });
                    }
                    for (pos, ((value, dim), dest)) in special
                        .assignment
                        .iter()
                        .zip(dims.iter())
                        .zip(row.iter_mut())
                        .enumerate()
                    {
                        if value >= dim {
                            return Err(GraphBuildError::SpecialStateValue {
                                factor,
                                state: state_id,
                                pos,
                                value: *value,
                                dim: *dim,
                            });
                        }
                        *dest = *value;
                    }
                }
                Ok(Potential::Sparse {
                    states,
                    costs: special_states.iter().map(|s| s.cost).collect(),
                })
            }
        }
    }

    pub(crate) fn is_sparse(&self) -> bool {
        matches!(self, Potential::Sparse { .. })
    }

    /// Index of the first special state equal to `state`, if any.
    /// Always `None` for dense potentials.
    pub(crate) fn special_state_index(&self, state: &[usize]) -> Option<usize> {
        match self {
            Potential::Dense { .. } => None,
            Potential::Sparse { states, .. } => states
                .outer_iter()
                .position(|row| row.iter().eq(state.iter())),
        }
    }

    /// Cost of a joint state of the factor's variables.
    #[inline]
    pub(crate) fn cost(&self, dims: &[usize], state: &[usize]) -> Cost {
        match self {
            Potential::Dense { table } => table[index::to_index(state, dims)],
            Potential::Sparse { costs, .. } => self
                .special_state_index(state)
                .map_or(0.0, |idx| costs[idx]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: &FactorSpec, cardinalities: &[usize]) -> Result<Potential, GraphBuildError> {
        let dims = factor_dims(0, &spec.variables, cardinalities)?;
        Potential::compile(&spec.potential, 0, &dims)
    }

    #[test]
    fn dense_lookup_uses_codec_order() {
        let spec = FactorSpec::dense(vec![0, 1], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let pot = compile(&spec, &[2, 3]).unwrap();
        assert_eq!(pot.cost(&[2, 3], &[1, 0]), 1.0);
        assert_eq!(pot.cost(&[2, 3], &[0, 2]), 4.0);
        assert_eq!(pot.special_state_index(&[0, 2]), None);
    }

    #[test]
    fn sparse_lookup() {
        let spec = FactorSpec::sparse(
            vec![1, 0],
            vec![
                SpecialState::new(vec![2, 0], 1.5),
                SpecialState::new(vec![0, 1], -2.0),
            ],
        );
        let pot = compile(&spec, &[2, 3]).unwrap();
        let dims = [3, 2];
        assert_eq!(pot.special_state_index(&[0, 1]), Some(1));
        assert_eq!(pot.cost(&dims, &[2, 0]), 1.5);
        assert_eq!(pot.cost(&dims, &[0, 1]), -2.0);
        // Not a special state.
        assert_eq!(pot.special_state_index(&[1, 1]), None);
        assert_eq!(pot.cost(&dims, &[1, 1]), 0.0);
    }

    #[test]
    fn first_matching_special_state_wins() {
        let spec = FactorSpec::sparse(
            vec![0],
            vec![SpecialState::new(vec![1], 4.0), SpecialState::new(vec![1], 7.0)],
        );
        let pot = compile(&spec, &[2]).unwrap();
        assert_eq!(pot.cost(&[2], &[1]), 4.0);
    }

    #[test]
    fn invalid_factors() {
        let card = [2, 3];
        assert_eq!(
            compile(&FactorSpec::dense(vec![0, 1], vec![0.0; 5]), &card).unwrap_err(),
            GraphBuildError::TableSize {
                factor: 0,
                got: 5,
                expected: Some(6)
            }
        );
        assert_eq!(
            compile(&FactorSpec::dense(vec![0, 2], vec![0.0; 6]), &card).unwrap_err(),
            GraphBuildError::UnknownVar {
                factor: 0,
                var: 2,
                n_vars: 2
            }
        );
        assert_eq!(
            compile(&FactorSpec::dense(vec![1, 1], vec![0.0; 9]), &card).unwrap_err(),
            GraphBuildError::RepeatedVar { factor: 0, var: 1 }
        );
        assert_eq!(
            compile(&FactorSpec::dense(vec![], vec![0.0]), &card).unwrap_err(),
            GraphBuildError::EmptyFactor { factor: 0 }
        );
        assert_eq!(
            compile(&FactorSpec::dense(vec![0], vec![0.0, Cost::NAN]), &card).unwrap_err(),
            GraphBuildError::NonFiniteCost { factor: 0 }
        );
        let bad_arity = FactorSpec::sparse(vec![0, 1], vec![SpecialState::new(vec![0], 1.0)]);
        assert_eq!(
            compile(&bad_arity, &card).unwrap_err(),
            GraphBuildError::SpecialStateArity {
                factor: 0,
                state: 0,
                got: 1,
                expected: 2
            }
        );
        let bad_value = FactorSpec::sparse(
            vec![0, 1],
            vec![
                SpecialState::new(vec![1, 2], 1.0),
                SpecialState::new(vec![1, 3], 1.0),
            ],
        );
        assert_eq!(
            compile(&bad_value, &card).unwrap_err(),
            GraphBuildError::SpecialStateValue {
                factor: 0,
                state: 1,
                pos: 1,
                value: 3,
                dim: 3
            }
        );
    }

    #[test]
    fn densify_sparse() {
        let spec = FactorSpec::sparse(
            vec![0, 1],
            vec![SpecialState::new(vec![1, 2], 3.0)],
        );
        let dense = spec.densify(0, &[2, 3]).unwrap();
        assert_eq!(
            dense,
            FactorSpec::dense(vec![0, 1], vec![0.0, 0.0, 0.0, 0.0, 0.0, 3.0])
        );
    }

    #[test]
    fn wire_format() {
        let dense: FactorSpec =
            serde_json::from_str(r#"{"variables": [0], "costs": [3.0, 1.0]}"#).unwrap();
        assert_eq!(dense, FactorSpec::dense(vec![0], vec![3.0, 1.0]));
        let sparse: FactorSpec = serde_json::from_str(
            r#"{"variables": [0, 1], "special_states": [{"assignment": [1, 0], "cost": 2.0}]}"#,
        )
        .unwrap();
        assert!(sparse.is_sparse());
        let mixed = serde_json::from_str::<FactorSpec>(
            r#"{"variables": [0], "costs": [0.0], "special_states": []}"#,
        );
        assert!(mixed.is_err());
        let missing = serde_json::from_str::<FactorSpec>(r#"{"variables": [0]}"#);
        assert!(missing.is_err());
    }
}
