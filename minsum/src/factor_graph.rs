use indexmap::IndexMap;
use thiserror::Error;

use crate::factor::{self, FactorSpec, Potential};

pub type VarId = usize;
pub type FactorId = usize;
pub type EdgeId = usize;

pub(crate) type VarVec<T> = Vec<T>;
pub(crate) type EdgeVec<T> = Vec<T>;
pub(crate) type EdgeSlice<T> = [T];

#[derive(Debug, Clone)]
pub(crate) struct Var {
    /// Number of states.
    pub(crate) dim: usize,
    pub(crate) edges: IndexMap<FactorId, EdgeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Factor {
    pub(crate) potential: Potential,
    /// Cardinalities of the variables, in edge order.
    pub(crate) dims: Vec<usize>,
    /// Edge order is the order of the variables given for the factor.
    pub(crate) edges: IndexMap<VarId, EdgeId>,
}

/// Incidence between a variable and a factor. Both message directions of the
/// incidence are stored under the same id.
#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub(crate) var: VarId,
    pub(crate) factor: FactorId,
    /// Position of the variable in the factor.
    pub(crate) pos_factor: usize,
}

/// Variables, factors and their incidences, indexed by integer ids.
#[derive(Debug, Clone)]
pub struct FactorGraph {
    pub(crate) vars: VarVec<Var>,
    pub(crate) factors: Vec<Factor>,
    pub(crate) edges: EdgeVec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphBuildError {
    #[error("Variable {var} has no states.")]
    EmptyVar { var: VarId },
    #[error("Factor {factor} has no variables.")]
    EmptyFactor { factor: FactorId },
    #[error("Factor {factor} references variable {var}, but there are {n_vars} variables.")]
    UnknownVar {
        factor: FactorId,
        var: VarId,
        n_vars: usize,
    },
    #[error("Factor {factor} references variable {var} more than once.")]
    RepeatedVar { factor: FactorId, var: VarId },
    #[error(
        "Dense factor {factor} has {got} costs, expected {}.",
        crate::count_or_overflow(.expected)
    )]
    TableSize {
        factor: FactorId,
        got: usize,
        expected: Option<u64>,
    },
    #[error("Factor {factor} has too many joint states to be indexed.")]
    DomainOverflow { factor: FactorId },
    #[error("Special state {state} of factor {factor} has {got} values, expected {expected}.")]
    SpecialStateArity {
        factor: FactorId,
        state: usize,
        got: usize,
        expected: usize,
    },
    #[error(
        "Special state {state} of factor {factor} sets position {pos} to {value}, \
         but that variable has {dim} states."
    )]
    SpecialStateValue {
        factor: FactorId,
        state: usize,
        pos: usize,
        value: usize,
        dim: usize,
    },
    #[error("Factor {factor} has a non-finite cost.")]
    NonFiniteCost { factor: FactorId },
    #[error("A factor cannot have both dense costs and special states.")]
    MixedRepresentation,
    #[error("A factor needs either dense costs or special states.")]
    MissingPotential,
    #[error("Assignment has {got} labels, expected {expected}.")]
    AssignmentLength { got: usize, expected: usize },
    #[error("Label {label} of variable {var} is out of range ({dim} states).")]
    LabelOutOfRange { var: VarId, label: usize, dim: usize },
}

impl FactorGraph {
    /// Build the graph, validating every factor before any solver runs.
    pub fn build(
        cardinalities: &[usize],
        factors: &[FactorSpec],
    ) -> Result<Self, GraphBuildError> {
        if let Some(var) = cardinalities.iter().position(|d| *d == 0) {
            return Err(GraphBuildError::EmptyVar { var });
        }
        let mut graph = Self {
            vars: cardinalities
                .iter()
                .map(|dim| Var {
                    dim: *dim,
                    edges: IndexMap::new(),
                })
                .collect(),
            factors: Vec::with_capacity(factors.len()),
            edges: Vec::new(),
        };
        for spec in factors {
            graph.add_factor(spec, cardinalities)?;
        }
        Ok(graph)
    }

    fn add_factor(
        &mut self,
        spec: &FactorSpec,
        cardinalities: &[usize],
    ) -> Result<(), GraphBuildError> {
        let factor_id = self.factors.len();
        let dims = factor::factor_dims(factor_id, &spec.variables, cardinalities)?;
        let potential = Potential::compile(&spec.potential, factor_id, &dims)?;
        let mut edges = IndexMap::with_capacity(spec.variables.len());
        for (pos_factor, var_id) in spec.variables.iter().enumerate() {
            let edge_id = self.edges.len();
            self.vars[*var_id].edges.insert(factor_id, edge_id);
            edges.insert(*var_id, edge_id);
            self.edges.push(Edge {
                var: *var_id,
                factor: factor_id,
                pos_factor,
            });
        }
        self.factors.push(Factor {
            potential,
            dims,
            edges,
        });
        Ok(())
    }

    pub(crate) fn var(&self, var: VarId) -> &Var {
        &self.vars[var]
    }
    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }
    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }
    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn range_factors(&self) -> impl Iterator<Item = FactorId> {
        0..self.n_factors()
    }
    pub fn cardinalities(&self) -> Vec<usize> {
        self.vars.iter().map(|v| v.dim).collect()
    }
    /// Variables of a factor, in the order they were given.
    pub fn factor_vars(&self, factor: FactorId) -> impl Iterator<Item = VarId> + '_ {
        self.factors[factor].edges.keys().copied()
    }
    pub fn factor_is_sparse(&self, factor: FactorId) -> bool {
        self.factors[factor].potential.is_sparse()
    }
    /// Edge between `var` and `factor`, if the variable belongs to the factor.
    pub fn edge(&self, var: VarId, factor: FactorId) -> Option<EdgeId> {
        self.vars.get(var)?.edges.get(&factor).copied()
    }
    pub fn edge_var(&self, edge: EdgeId) -> VarId {
        self.edges[edge].var
    }
    pub fn edge_factor(&self, edge: EdgeId) -> FactorId {
        self.edges[edge].factor
    }

    /// Whether the variable-factor incidence graph has a cycle.
    pub fn is_cyclic(&self) -> bool {
        // Union-find over variables then factors.
        let n_nodes = self.n_vars() + self.n_factors();
        let mut parent: Vec<usize> = (0..n_nodes).collect();
        fn root(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for edge in self.edges.iter() {
            let a = root(&mut parent, edge.var);
            let b = root(&mut parent, self.n_vars() + edge.factor);
            if a == b {
                return true;
            }
            parent[a] = b;
        }
        false
    }
}
