//! Approximate MAP labeling of discrete factor graphs by min-sum message passing.
//!
//! A problem is a list of variable cardinalities and a list of cost factors,
//! each either dense (a full cost table) or sparse (a few explicitly costed
//! joint states, every other state costs zero). [`solve_approx`] runs a fixed
//! number of synchronous min-sum iterations and returns the lowest-energy
//! labeling it encountered; [`solve_exact`] enumerates the whole joint state
//! space and is meant for validation on small instances.

pub mod brute_force;
pub mod energy;
pub mod factor;
pub mod factor_graph;
mod fg_build;
mod fg_parser;
pub mod index;
pub mod min_sum;
pub(crate) mod msg_compute;
pub mod potentials;
pub(crate) mod progress;

pub use factor::{Cost, FactorSpec, PotentialSpec, SpecialState};
pub use factor_graph::{EdgeId, FactorGraph, FactorId, GraphBuildError, VarId};
pub use fg_build::{DescriptionError, ParsedProblem};
pub use min_sum::{ApproxSolution, IterationReport, MinSumState};

use thiserror::Error;

type Result<T> = std::result::Result<T, MinSumError>;

/// Default limit on the number of joint states enumerated by [`solve_exact`].
pub const DEFAULT_MAX_EXACT_STATES: u64 = 10_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MinSumError {
    #[error(transparent)]
    Graph(#[from] GraphBuildError),
    #[error(
        "Too many joint states for exhaustive search: {} states, limit is {limit}.",
        count_or_overflow(.n_states)
    )]
    TooManyStates { n_states: Option<u64>, limit: u64 },
    #[error(
        "Linear index {index} out of range for a domain of {} states.",
        count_or_overflow(.size)
    )]
    IndexOutOfRange { index: usize, size: Option<u64> },
    #[error("Invalid problem description:\n{0}")]
    Parse(String),
    #[error(transparent)]
    Description(#[from] DescriptionError),
}

fn count_or_overflow(n: &Option<u64>) -> String {
    match n {
        Some(n) => n.to_string(),
        None => "more than 2**64".to_owned(),
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Computation time after which a progress bar is displayed.
    /// This avoids showing progress bars for negligible amounts of time.
    progress_min_time: std::time::Duration,
    /// Display a progress bar
    show_progress: bool,
    /// Largest joint state space the brute-force solver accepts.
    max_exact_states: u64,
    /// Subtract the mean from every message after it is computed.
    normalize_messages: bool,
}

impl Config {
    pub fn with_default_timing() -> Self {
        Self {
            progress_min_time: std::time::Duration::from_millis(500),
            show_progress: true,
            max_exact_states: DEFAULT_MAX_EXACT_STATES,
            normalize_messages: false,
        }
    }
    pub fn no_progress() -> Self {
        Self {
            show_progress: false,
            ..Self::with_default_timing()
        }
    }
    pub fn with_max_exact_states(mut self, max_exact_states: u64) -> Self {
        self.max_exact_states = max_exact_states;
        self
    }
    /// Mean-normalized messages keep bounded magnitudes on loopy graphs.
    /// Every belief of a variable is shifted by the same amount, so labels and
    /// energies are unchanged.
    pub fn with_normalized_messages(mut self, normalize: bool) -> Self {
        self.normalize_messages = normalize;
        self
    }
    pub fn max_exact_states(&self) -> u64 {
        self.max_exact_states
    }
    pub fn normalize_messages(&self) -> bool {
        self.normalize_messages
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::no_progress()
    }
}

/// A labeling (one state index per variable) and its energy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Solution {
    pub labels: Vec<usize>,
    pub energy: Cost,
}

/// Variable cardinalities and factors, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Problem {
    pub cardinalities: Vec<usize>,
    pub factors: Vec<FactorSpec>,
}

impl Problem {
    pub fn graph(&self) -> Result<FactorGraph> {
        Ok(FactorGraph::build(&self.cardinalities, &self.factors)?)
    }
    pub fn solve_exact(&self, config: &Config) -> Result<Solution> {
        brute_force::solve(&self.graph()?, config)
    }
    pub fn solve_approx(&self, iterations: usize, config: &Config) -> Result<Solution> {
        let graph = std::sync::Arc::new(self.graph()?);
        Ok(MinSumState::new(graph, config).run(iterations).solution)
    }
}

/// Minimum-energy labeling by exhaustive enumeration.
///
/// Fails with [`MinSumError::TooManyStates`] before enumerating anything if the
/// product of the cardinalities exceeds [`Config::max_exact_states`].
pub fn solve_exact(
    cardinalities: &[usize],
    factors: &[FactorSpec],
    config: &Config,
) -> Result<Solution> {
    let graph = FactorGraph::build(cardinalities, factors)?;
    brute_force::solve(&graph, config)
}

/// Best labeling found by `iterations` rounds of synchronous min-sum.
///
/// Only malformed inputs are errors; non-convergence on loopy graphs is not.
pub fn solve_approx(
    cardinalities: &[usize],
    factors: &[FactorSpec],
    iterations: usize,
    config: &Config,
) -> Result<Solution> {
    let graph = std::sync::Arc::new(FactorGraph::build(cardinalities, factors)?);
    Ok(MinSumState::new(graph, config)
        .run(iterations)
        .solution)
}

/// Parse a textual problem description.
///
/// ```text
/// VAR a 3
/// VAR b 2
/// DENSE a = [3.0, 1.0, 2.0]
/// SPARSE a b = {(0, 1): 2.5, (2, 0): -1}
/// ```
pub fn parse_problem(description: &str) -> Result<ParsedProblem> {
    let stmts = fg_parser::parse(description).map_err(MinSumError::Parse)?;
    Ok(fg_build::build_problem(stmts.as_slice())?)
}
