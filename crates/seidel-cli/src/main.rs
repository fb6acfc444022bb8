mod file;

use clap::{Parser, Subcommand};
use seidel_bound::{Activation, LinearBounder};
use seidel_lp::{Solution, Solver};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::file::ProblemFile;

#[derive(Parser)]
#[command(name = "seidel")]
#[command(about = "Randomized LP solver for small dimensions", long_about = None)]
struct Cli {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a JSON problem file
    Solve {
        /// The problem file
        file: PathBuf,
        /// Seed for the constraint permutation
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
        /// Give up after this many restrictions to a boundary hyperplane
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Tolerance for boundary comparisons
        #[arg(long, default_value_t = 1e-9)]
        tolerance: f64,
    },
    /// Check a problem file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
    /// Compute linear bounds of an activation function over an interval
    Bound {
        /// sigmoid, tanh or softplus
        function: String,
        /// Lower end of the interval
        #[arg(long, allow_hyphen_values = true)]
        lower: f64,
        /// Upper end of the interval
        #[arg(long, allow_hyphen_values = true)]
        upper: f64,
        /// Allowed slack of the bounds
        #[arg(long, default_value_t = 1e-2)]
        eps: f64,
        /// Initial number of sample points
        #[arg(long, default_value_t = 200)]
        points: usize,
        /// Output format (json, pretty)
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Commands::Solve {
            file,
            seed,
            format,
            max_iterations,
            tolerance,
        } => {
            let labeled = match ProblemFile::load(&file).and_then(|f| f.build().map_err(Into::into)) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };

            let mut solver = Solver::new().with_tolerance(tolerance);
            if let Some(max) = max_iterations {
                solver = solver.with_max_iterations(max);
            }
            let solution = match solver.solve(&labeled.problem, seed) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Solve error: {}", e);
                    std::process::exit(1);
                }
            };

            if format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&solution).unwrap_or_else(|e| format!("Error: {}", e))
                );
                return;
            }

            println!("Status: {}", solution.status());
            match &solution {
                Solution::Optimal { point, value } => {
                    println!("Objective value: {:.6}", value);
                    println!();
                    println!("Point:");
                    for (j, x) in point.iter().enumerate() {
                        println!("  x{:<4} {:14.6}", j, x);
                    }

                    let binding = labeled.problem.binding_constraints(point, tolerance);
                    if !binding.is_empty() {
                        println!();
                        println!("Binding constraints:");
                        for index in binding {
                            println!("  - {}", labeled.labels[index]);
                        }
                    }
                }
                Solution::Infeasible => {
                    println!("No point satisfies all constraints.");
                    std::process::exit(1);
                }
                Solution::Unbounded { direction } => {
                    println!("The objective improves without bound along {:?}.", direction);
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { file } => {
            let source = match ProblemFile::load(&file) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            };

            match source.build() {
                Ok(labeled) => {
                    println!("✓ {} is valid", file.display());
                    println!("  {} variables", labeled.problem.dimension());
                    println!("  {} constraints", source.constraints.len());
                    println!("  {} half-spaces", labeled.problem.num_constraints());
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Bound {
            function,
            lower,
            upper,
            eps,
            points,
            format,
        } => {
            let activation: Activation = match function.parse() {
                Ok(a) => a,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };

            let bounder = LinearBounder::for_activation(activation)
                .with_eps(eps)
                .with_initial_points(points);
            let bounds = match bounder.find_optimal_bounds(&[(lower, upper)]) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Bound error: {}", e);
                    std::process::exit(1);
                }
            };

            if format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&bounds).unwrap_or_else(|e| format!("Error: {}", e))
                );
                return;
            }

            println!("Function: {} on [{}, {}]", activation, lower, upper);
            println!(
                "  lower: {:.6} * x {:+.6}",
                bounds.lower.slope[0], bounds.lower.intercept
            );
            println!(
                "  upper: {:.6} * x {:+.6}",
                bounds.upper.slope[0], bounds.upper.intercept
            );
        }
    }
}
