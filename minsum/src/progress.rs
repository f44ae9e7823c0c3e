//! Progress display shared by the solvers.
//!
//! A solver counts its work units and reports the energies it finds on a
//! [`SolveProgress`]. A helper thread shows them on a progress bar once the
//! solve has run for `Config::progress_min_time`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use hytra::TrAdder;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};

use crate::factor::Cost;
use crate::Config;

const BAR_TEMPLATE: &str =
    "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} (ETA {eta})";

/// Work counter and lowest energy reported so far. Shared across rayon tasks.
pub(crate) struct SolveProgress {
    done: TrAdder<u64>,
    // f64 bits, +inf until the first report
    best_energy: AtomicU64,
}

impl SolveProgress {
    fn new() -> Self {
        Self {
            done: TrAdder::new(),
            best_energy: AtomicU64::new(Cost::INFINITY.to_bits()),
        }
    }

    /// One more unit of work (an iteration, a block of joint states) is done.
    pub(crate) fn inc(&self) {
        self.done.inc(1);
    }

    pub(crate) fn done(&self) -> u64 {
        self.done.get()
    }

    /// Record the energy of a labeling, the lowest one is displayed.
    pub(crate) fn record_energy(&self, energy: Cost) {
        // Err means the stored energy is already lower.
        let _ = self
            .best_energy
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (energy < Cost::from_bits(bits)).then(|| energy.to_bits())
            });
    }

    pub(crate) fn best_energy(&self) -> Option<Cost> {
        let energy = Cost::from_bits(self.best_energy.load(Ordering::Acquire));
        energy.is_finite().then_some(energy)
    }

    fn message(&self) -> String {
        self.best_energy()
            .map(|e| format!("best energy {:.3}", e))
            .unwrap_or_default()
    }
}

/// Run `solve`, displaying its progress over `n_units` work units if it takes
/// longer than `config.progress_min_time`.
pub(crate) fn with_progress<F, T>(
    solve: F,
    n_units: u64,
    solver: &'static str,
    config: &Config,
) -> T
where
    F: FnOnce(&SolveProgress) -> T + Send,
    T: Send,
{
    let progress = SolveProgress::new();
    let finished = AtomicBool::new(false);
    thread::scope(|s| {
        let progress = &progress;
        let finished = &finished;
        let bar_thread = config.show_progress.then(|| {
            s.spawn(move || {
                let start = Instant::now();
                loop {
                    let elapsed = start.elapsed();
                    if elapsed >= config.progress_min_time {
                        break;
                    }
                    thread::park_timeout(config.progress_min_time - elapsed);
                    if finished.load(Ordering::Acquire) {
                        return;
                    }
                }
                let style = ProgressStyle::default_bar()
                    .template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                let pb = ProgressBar::new(n_units)
                    .with_style(style)
                    .with_finish(ProgressFinish::AndClear)
                    .with_prefix(solver)
                    .with_position(progress.done());
                while !finished.load(Ordering::Acquire) {
                    pb.set_position(progress.done());
                    pb.set_message(progress.message());
                    thread::park_timeout(Duration::from_millis(50));
                }
                pb.finish_and_clear();
            })
        });

        let res = solve(progress);
        finished.store(true, Ordering::Release);
        // Wake the bar thread so that it does not wait for its timeout.
        if let Some(handle) = bar_thread {
            handle.thread().unpark();
        }
        res
    })
}
