//! minsum CLI: solve discrete factor graph problems from text or JSON files.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use minsum::{Config, ParsedProblem, Problem, Solution};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "minsum")]
#[command(about = "Minimum-energy labeling of discrete factor graphs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem and print the labeling and its energy.
    Solve(SolveArgs),

    /// Validate a problem and print a summary.
    Check {
        /// Problem file (`.fg` text description or `.json`).
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct SolveArgs {
    /// Problem file (`.fg` text description or `.json`).
    file: PathBuf,

    /// Number of min-sum iterations.
    #[arg(long, default_value = "30")]
    iterations: usize,

    /// Use exhaustive search instead of min-sum.
    #[arg(long)]
    exact: bool,

    /// Largest number of joint states for exhaustive search.
    #[arg(long, default_value_t = minsum::DEFAULT_MAX_EXACT_STATES)]
    max_exact_states: u64,

    /// Mean-normalize messages.
    #[arg(long)]
    normalize: bool,

    /// Show progress bars for long computations.
    #[arg(long)]
    progress: bool,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(serde::Serialize)]
struct SolveOutput<'a> {
    names: &'a [String],
    #[serde(flatten)]
    solution: &'a Solution,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Errors are shown with Display: parse errors carry a multi-line report.
    if let Err(e) = run(Cli::parse()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Commands::Solve(args) => run_solve(&args),
        Commands::Check { file } => run_check(&file),
    }
}

/// Text descriptions carry variable names, JSON problems are named by index.
fn load(path: &Path) -> CliResult<ParsedProblem> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| -> CliError { format!("cannot read {}: {}", path.display(), e).into() })?;
    if path.extension().is_some_and(|ext| ext == "json") {
        let problem: Problem = serde_json::from_str(&src)?;
        let names = (0..problem.cardinalities.len())
            .map(|v| format!("v{}", v))
            .collect();
        Ok(ParsedProblem { names, problem })
    } else {
        Ok(minsum::parse_problem(&src)?)
    }
}

fn run_solve(args: &SolveArgs) -> CliResult<()> {
    let ParsedProblem { names, problem } = load(&args.file)?;
    let config = if args.progress {
        Config::with_default_timing()
    } else {
        Config::no_progress()
    }
    .with_max_exact_states(args.max_exact_states)
    .with_normalized_messages(args.normalize);
    let solution = if args.exact {
        problem.solve_exact(&config)?
    } else {
        problem.solve_approx(args.iterations, &config)?
    };
    log::info!("Energy of {}: {}", args.file.display(), solution.energy);
    if args.json {
        let output = SolveOutput {
            names: &names,
            solution: &solution,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("energy: {}", solution.energy);
        for (name, label) in names.iter().zip(solution.labels.iter()) {
            println!("  {} = {}", name, label);
        }
    }
    Ok(())
}

fn run_check(file: &Path) -> CliResult<()> {
    let ParsedProblem { problem, .. } = load(file)?;
    let graph = problem.graph()?;
    let n_sparse = graph
        .range_factors()
        .filter(|f| graph.factor_is_sparse(*f))
        .count();
    let n_states = minsum::index::domain_size(&problem.cardinalities);
    println!("{}", file.display());
    println!("  variables:     {}", graph.n_vars());
    println!(
        "  factors:       {} ({} dense, {} sparse)",
        graph.n_factors(),
        graph.n_factors() - n_sparse,
        n_sparse
    );
    println!("  edges:         {}", graph.n_edges());
    println!("  cyclic:        {}", graph.is_cyclic());
    match n_states {
        Some(n) => println!("  joint states:  {}", n),
        None => println!("  joint states:  more than 2**64"),
    }
    Ok(())
}
