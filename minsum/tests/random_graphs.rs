use std::sync::Arc;

use ndarray::Array1;
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256StarStar;

use minsum::potentials;
use minsum::{
    solve_approx, solve_exact, Config, FactorGraph, FactorSpec, MinSumState, SpecialState,
};

fn random_costs(n: usize, rng: &mut Xoshiro256StarStar) -> Vec<f64> {
    Array1::<f64>::random_using(n, Uniform::new(-5.0, 5.0), rng).to_vec()
}

fn random_special_states(
    dims: &[usize],
    n_states: usize,
    rng: &mut Xoshiro256StarStar,
) -> Vec<SpecialState> {
    (0..n_states)
        .map(|_| {
            let assignment = dims.iter().map(|d| rng.gen_range(0..*d)).collect();
            SpecialState::new(assignment, rng.gen_range(-5.0..5.0))
        })
        .collect()
}

/// Random tree-structured problem: unary factors on every variable, and a
/// pairwise factor (dense or sparse) between each variable and a random
/// earlier one.
fn gen_tree(n: usize, seed: u64) -> (Vec<usize>, Vec<FactorSpec>) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    let cardinalities = Array1::<usize>::random_using(n, Uniform::new(1, 5), &mut rng).to_vec();
    let mut factors: Vec<_> = cardinalities
        .iter()
        .enumerate()
        .map(|(v, d)| FactorSpec::dense(vec![v], random_costs(*d, &mut rng)))
        .collect();
    for v in 1..n {
        let parent = rng.gen_range(0..v);
        let dims = [cardinalities[v], cardinalities[parent]];
        if rng.gen_bool(0.5) {
            factors.push(FactorSpec::dense(
                vec![v, parent],
                random_costs(dims[0] * dims[1], &mut rng),
            ));
        } else {
            let n_states = rng.gen_range(0..4);
            factors.push(FactorSpec::sparse(
                vec![v, parent],
                random_special_states(&dims, n_states, &mut rng),
            ));
        }
    }
    (cardinalities, factors)
}

/// Random loopy problem: a 3x3 grid with unary factors and random pairwise
/// and triple factors, a third of them sparse.
fn gen_loopy(seed: u64) -> (Vec<usize>, Vec<FactorSpec>) {
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
    let cardinalities = vec![3; 9];
    let mut factors: Vec<_> = (0..9)
        .map(|v| FactorSpec::dense(vec![v], random_costs(3, &mut rng)))
        .collect();
    let mut scopes = Vec::new();
    for r in 0..3 {
        for c in 0..3 {
            let v = 3 * r + c;
            if c < 2 {
                scopes.push(vec![v, v + 1]);
            }
            if r < 2 {
                scopes.push(vec![v, v + 3]);
            }
        }
    }
    scopes.push(vec![0, 4, 8]);
    for (i, scope) in scopes.into_iter().enumerate() {
        let dims = vec![3; scope.len()];
        if i % 3 == 0 {
            factors.push(FactorSpec::sparse(
                scope,
                random_special_states(&dims, 5, &mut rng),
            ));
        } else {
            let size = dims.iter().product();
            factors.push(FactorSpec::dense(scope, random_costs(size, &mut rng)));
        }
    }
    (cardinalities, factors)
}

#[test]
fn trees_are_solved_exactly() {
    let config = Config::no_progress();
    for seed in 0..20 {
        let n = 2 + (seed as usize % 7);
        let (cardinalities, factors) = gen_tree(n, seed);
        let exact = solve_exact(&cardinalities, &factors, &config).unwrap();
        let approx = solve_approx(&cardinalities, &factors, 2 * n + 2, &config).unwrap();
        assert!(
            (exact.energy - approx.energy).abs() < 1e-9,
            "seed {}: exact {} approx {}",
            seed,
            exact.energy,
            approx.energy
        );
    }
}

#[test]
fn sparse_matches_densified() {
    let config = Config::no_progress();
    for seed in 0..5 {
        let (cardinalities, factors) = gen_loopy(seed);
        let dense_factors: Vec<_> = factors
            .iter()
            .enumerate()
            .map(|(f, spec)| spec.densify(f, &cardinalities).unwrap())
            .collect();
        let sparse_graph = Arc::new(FactorGraph::build(&cardinalities, &factors).unwrap());
        let dense_graph = Arc::new(FactorGraph::build(&cardinalities, &dense_factors).unwrap());
        let mut sparse = MinSumState::new(sparse_graph, &config);
        let mut dense = MinSumState::new(dense_graph, &config);
        for _ in 0..10 {
            assert_eq!(sparse.step(), dense.step());
            assert_eq!(sparse.messages_to_var(), dense.messages_to_var());
            assert_eq!(sparse.messages_from_var(), dense.messages_from_var());
            assert_eq!(sparse.beliefs(), dense.beliefs());
            assert_eq!(sparse.labels(), dense.labels());
        }
    }
}

#[test]
fn empty_sparse_matches_zero_dense() {
    let config = Config::no_progress();
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let cardinalities = vec![2, 3, 4];
    let mut unaries: Vec<_> = cardinalities
        .iter()
        .enumerate()
        .map(|(v, d)| FactorSpec::dense(vec![v], random_costs(*d, &mut rng)))
        .collect();
    let mut with_sparse = unaries.clone();
    with_sparse.push(FactorSpec::sparse(vec![0, 1, 2], vec![]));
    with_sparse.push(FactorSpec::sparse(vec![2, 0], vec![]));
    unaries.push(FactorSpec::dense(vec![0, 1, 2], vec![0.0; 24]));
    unaries.push(FactorSpec::dense(vec![2, 0], vec![0.0; 8]));
    let mut sparse = MinSumState::new(
        Arc::new(FactorGraph::build(&cardinalities, &with_sparse).unwrap()),
        &config,
    );
    let mut dense = MinSumState::new(
        Arc::new(FactorGraph::build(&cardinalities, &unaries).unwrap()),
        &config,
    );
    for _ in 0..5 {
        assert_eq!(sparse.step(), dense.step());
        assert_eq!(sparse.messages_to_var(), dense.messages_to_var());
        assert_eq!(sparse.messages_from_var(), dense.messages_from_var());
    }
}

#[test]
fn best_energy_never_increases() {
    let config = Config::no_progress();
    for seed in 0..5 {
        let (cardinalities, factors) = gen_loopy(seed);
        let graph = Arc::new(FactorGraph::build(&cardinalities, &factors).unwrap());
        assert!(graph.is_cyclic());
        let res = MinSumState::new(graph.clone(), &config).run(30);
        assert_eq!(res.trace.len(), 30);
        let mut best = f64::INFINITY;
        for report in res.trace.iter() {
            best = best.min(report.energy);
            assert_eq!(report.best_energy, best);
        }
        assert_eq!(res.solution.energy, best);
        assert_eq!(graph.energy(&res.solution.labels).unwrap(), best);
        let exact = solve_exact(&cardinalities, &factors, &config).unwrap();
        assert!(exact.energy <= best);
    }
}

#[test]
fn potts_grid() {
    // Strong unary preference on one corner, smoothness elsewhere.
    let config = Config::no_progress().with_normalized_messages(true);
    let n = 4;
    let cardinalities = vec![2; n * n];
    let mut factors = vec![FactorSpec::dense(vec![0], vec![10.0, 0.0])];
    for r in 0..n {
        for c in 0..n {
            let v = n * r + c;
            if c + 1 < n {
                factors.push(FactorSpec::dense(vec![v, v + 1], potentials::potts(2, 1.0)));
            }
            if r + 1 < n {
                factors.push(FactorSpec::sparse(
                    vec![v, v + n],
                    potentials::sparse_potts(2, 1.0),
                ));
            }
        }
    }
    let sol = solve_approx(&cardinalities, &factors, 20, &config).unwrap();
    assert_eq!(sol.labels, vec![1; n * n]);
    // Every vertical factor contributes its bonus.
    assert_eq!(sol.energy, -((n * (n - 1)) as f64));
}
