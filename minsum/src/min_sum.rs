//! Synchronous (flooding) min-sum message passing.
//!
//! Each iteration runs three phases, each one reading only the output of the
//! previous phase:
//! 1. every factor to variable message, from the variable to factor messages of
//!    the previous iteration (all zero at the first iteration),
//! 2. every variable to factor message, from the messages of phase 1,
//! 3. beliefs and the candidate labeling (arg-min of each belief).
//!
//! The candidate labeling is then scored with [`FactorGraph::energy`], and the
//! lowest-energy labeling over all iterations is kept. On loopy graphs the
//! candidate energy need not decrease from one iteration to the next, hence the
//! fixed iteration budget.

use std::sync::Arc;

use log::{debug, info, log_enabled, trace, Level};
use ndarray::Array1;
use rayon::prelude::*;

use crate::factor::{Cost, Potential};
use crate::factor_graph::{EdgeVec, FactorGraph, VarVec};
use crate::msg_compute;
use crate::progress;
use crate::{Config, Solution};

/// Diagnostics of a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IterationReport {
    pub iteration: usize,
    /// Energy of the candidate labeling of this iteration.
    pub energy: Cost,
    /// Lowest candidate energy up to and including this iteration.
    pub best_energy: Cost,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ApproxSolution {
    pub solution: Solution,
    pub trace: Vec<IterationReport>,
}

#[derive(Debug, Clone)]
pub struct MinSumState {
    graph: Arc<FactorGraph>,
    // messages on each edge
    to_var: EdgeVec<Array1<Cost>>,
    from_var: EdgeVec<Array1<Cost>>,
    beliefs: VarVec<Array1<Cost>>,
    // arg-min of the beliefs
    labels: Vec<usize>,
    iteration: usize,
    best: Option<Solution>,
    config: Config,
}

impl MinSumState {
    /// All messages and beliefs start at zero. `config` sets message
    /// normalization and the progress display of [`MinSumState::run`].
    pub fn new(graph: Arc<FactorGraph>, config: &Config) -> Self {
        let zero_edges = || -> EdgeVec<_> {
            graph
                .edges
                .iter()
                .map(|e| Array1::zeros(graph.var(e.var).dim))
                .collect()
        };
        let to_var = zero_edges();
        let from_var = zero_edges();
        let beliefs = graph.vars.iter().map(|v| Array1::zeros(v.dim)).collect();
        let labels = vec![0; graph.n_vars()];
        Self {
            to_var,
            from_var,
            beliefs,
            labels,
            iteration: 0,
            best: None,
            config: config.clone(),
            graph,
        }
    }

    /// Number of iterations run so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
    /// Factor to variable messages, indexed by edge.
    pub fn messages_to_var(&self) -> &[Array1<Cost>] {
        &self.to_var
    }
    /// Variable to factor messages, indexed by edge.
    pub fn messages_from_var(&self) -> &[Array1<Cost>] {
        &self.from_var
    }
    pub fn beliefs(&self) -> &[Array1<Cost>] {
        &self.beliefs
    }
    /// Candidate labeling of the last iteration.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
    /// Lowest-energy labeling seen so far, `None` before the first iteration.
    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }

    fn propagate_factors(&mut self) {
        let graph = &*self.graph;
        let from_var = &self.from_var;
        let new_messages: Vec<Vec<Array1<Cost>>> = graph
            .factors
            .par_iter()
            .map(|factor| msg_compute::factor_messages(factor, from_var))
            .collect();
        for (factor, messages) in graph.factors.iter().zip(new_messages) {
            for (e, mut msg) in factor.edges.values().zip(messages) {
                if self.config.normalize_messages() {
                    msg_compute::normalize(&mut msg);
                }
                self.to_var[*e] = msg;
            }
        }
    }

    fn propagate_vars(&mut self) {
        let graph = &*self.graph;
        let to_var = &self.to_var;
        let normalize = self.config.normalize_messages();
        self.from_var = graph
            .edges
            .par_iter()
            .enumerate()
            .map(|(e_id, e)| {
                let mut msg = msg_compute::var_message(graph.var(e.var), e_id, to_var);
                if normalize {
                    msg_compute::normalize(&mut msg);
                }
                msg
            })
            .collect();
    }

    fn update_beliefs(&mut self) {
        let graph = &*self.graph;
        let to_var = &self.to_var;
        self.beliefs = graph
            .vars
            .par_iter()
            .map(|var| msg_compute::belief(var, to_var))
            .collect();
        self.labels = self
            .beliefs
            .iter()
            .map(|b| msg_compute::arg_min(b.view()))
            .collect();
        if log_enabled!(Level::Trace) {
            for (v, (belief, label)) in self.beliefs.iter().zip(&self.labels).enumerate() {
                trace!("belief v{}: {} (label {})", v, belief, label);
            }
        }
    }

    fn dump_factors(&self) {
        for (f, factor) in self.graph.factors.iter().enumerate() {
            let vars: Vec<_> = factor.edges.keys().collect();
            match &factor.potential {
                Potential::Dense { table } => {
                    trace!("factor f{} over {:?}, dense: {}", f, vars, table);
                }
                Potential::Sparse { states, costs } => {
                    trace!("factor f{} over {:?}, {} special states", f, vars, costs.len());
                    for (state, cost) in states.outer_iter().zip(costs.iter()) {
                        trace!("  {} -> {}", state, cost);
                    }
                }
            }
        }
    }

    fn dump_messages(&self) {
        for (e_id, e) in self.graph.edges.iter().enumerate() {
            trace!(
                "message f{} -> v{} (position {}): {}",
                e.factor,
                e.var,
                e.pos_factor,
                self.to_var[e_id]
            );
        }
        for (e_id, e) in self.graph.edges.iter().enumerate() {
            trace!("message v{} -> f{}: {}", e.var, e.factor, self.from_var[e_id]);
        }
    }

    /// Run one iteration and score its candidate labeling.
    pub fn step(&mut self) -> IterationReport {
        self.propagate_factors();
        self.propagate_vars();
        self.update_beliefs();
        if log_enabled!(Level::Trace) {
            self.dump_messages();
        }
        let energy = self.graph.energy_with(&self.labels, &mut Vec::new());
        if self.best.as_ref().map_or(true, |best| energy < best.energy) {
            self.best = Some(Solution {
                labels: self.labels.clone(),
                energy,
            });
        }
        let report = IterationReport {
            iteration: self.iteration,
            energy,
            best_energy: self.best.as_ref().map_or(energy, |b| b.energy),
        };
        debug!(
            "Iteration: {:3}, Energy: {:.3}, Best: {:.3}",
            report.iteration, report.energy, report.best_energy
        );
        self.iteration += 1;
        report
    }

    /// Run `n_iter` iterations and return the best labeling seen.
    ///
    /// Without any iteration (`n_iter == 0` on a fresh state), this is the
    /// all-zeros labeling.
    pub fn run(&mut self, n_iter: usize) -> ApproxSolution {
        info!(
            "min-sum: {} variables, {} factors, {} iterations{}",
            self.graph.n_vars(),
            self.graph.n_factors(),
            n_iter,
            if self.graph.is_cyclic() {
                " (cyclic graph)"
            } else {
                ""
            }
        );
        if log_enabled!(Level::Trace) {
            self.dump_factors();
        }
        let config = self.config.clone();
        let trace = progress::with_progress(
            |progress| {
                (0..n_iter)
                    .map(|_| {
                        let report = self.step();
                        progress.record_energy(report.best_energy);
                        progress.inc();
                        report
                    })
                    .collect::<Vec<_>>()
            },
            n_iter as u64,
            "Min-sum",
            &config,
        );
        let solution = match &self.best {
            Some(best) => best.clone(),
            None => Solution {
                energy: self.graph.energy_with(&self.labels, &mut Vec::new()),
                labels: self.labels.clone(),
            },
        };
        info!("min-sum: best energy {:.3}", solution.energy);
        ApproxSolution { solution, trace }
    }
}
