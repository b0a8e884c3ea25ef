use clap::{Parser, Subcommand, ValueEnum};
use linprog_lang::Loader;
use linprog_model::{ConstraintOp, Model, ModelError, Sense, Solution, SolutionStatus};
use linprog_solver::SimplexSolver;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "linprog")]
#[command(about = "Build, render and solve small linear programs", long_about = None)]
struct Cli {
    /// Log solver progress to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a model listing and print the solution
    Solve {
        /// The model listing
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
        /// Simplex iteration limit per phase
        #[arg(long, default_value_t = 10000)]
        max_iterations: usize,
        /// Floating point tolerance
        #[arg(long, default_value_t = 1e-9, value_parser = parse_tolerance)]
        tolerance: f64,
    },
    /// Check a model listing for errors
    Check {
        /// The model listing
        file: PathBuf,
    },
    /// Parse a model listing and output the syntax tree
    Parse {
        /// The model listing
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
    /// Load a model listing and print it in canonical form
    Render {
        /// The model listing
        file: PathBuf,
    },
    /// Build and solve the two-variable example: max 30x + 20y s.t. 2x + 4y <= 32
    Demo {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Solve {
            file,
            format,
            max_iterations,
            tolerance,
        } => {
            let model = load(&file);
            let solver = SimplexSolver::new()
                .with_max_iterations(max_iterations)
                .with_tolerance(tolerance);
            let solution = model.solve(&solver);
            print_solution(&model, &solution, format);
        }
        Commands::Check { file } => {
            let model = load(&file);
            let integers = model.variables().iter().filter(|v| v.is_integer()).count();

            println!("✓ {} is valid", file.display());
            println!("  {} variables ({} integer)", model.num_variables(), integers);
            println!("  {} constraints", model.num_constraints());
            println!("  objective: {}", model.objective().sense.keyword());
        }
        Commands::Parse { file, format } => {
            let source = read_source(&file);
            match linprog_lang::Parser::parse(&source) {
                Ok(listing) => match format {
                    Format::Json => match serde_json::to_string_pretty(&listing) {
                        Ok(json) => println!("{}", json),
                        Err(e) => fail(format!("Serialization error: {}", e)),
                    },
                    Format::Pretty => println!("{:#?}", listing),
                },
                Err(e) => fail(format!("Parse error: {}", e)),
            }
        }
        Commands::Render { file } => {
            print!("{}", load(&file).render());
        }
        Commands::Demo { format } => {
            let model = match demo_model() {
                Ok(model) => model,
                Err(e) => fail(format!("Model error: {}", e)),
            };
            if format == Format::Pretty {
                print!("{}", model.render());
                println!();
            }
            let solution = model.solve(&SimplexSolver::new());
            print_solution(&model, &solution, format);
        }
    }
}

fn parse_tolerance(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(t) if t.is_finite() && t > 0.0 => Ok(t),
        Ok(t) => Err(format!("tolerance must be positive and finite, got {}", t)),
        Err(e) => Err(e.to_string()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: String) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn read_source(file: &Path) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => fail(format!("Error reading file: {}", e)),
    }
}

fn load(file: &Path) -> Model {
    let source = read_source(file);
    match Loader::load_str(&source) {
        Ok(model) => model,
        Err(e) => fail(format!("✗ {}: {}", file.display(), e)),
    }
}

fn demo_model() -> Result<Model, ModelError> {
    let mut model = Model::new();
    let x = model.add_continuous("x", 0.0, 10.0)?;
    let y = model.add_continuous("y", 0.0, 6.0)?;
    model.set_objective(30.0 * x + 20.0 * y, Sense::Maximize)?;
    model.add_constraint(2.0 * x + 4.0 * y, ConstraintOp::Le, 32.0)?;
    Ok(model)
}

fn print_solution(model: &Model, solution: &Solution, format: Format) {
    match format {
        Format::Pretty => print!("{}", solution.report(model)),
        Format::Json => {
            let values = solution.values().map(|values| {
                model
                    .variables()
                    .iter()
                    .zip(values)
                    .map(|(variable, value)| serde_json::json!({ "name": variable.name, "value": value }))
                    .collect::<Vec<_>>()
            });
            let report = serde_json::json!({
                "status": solution.status(),
                "objective_value": solution.objective_value(),
                "values": values,
                "message": solution.message(),
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_else(|e| e.to_string()));
        }
    }

    if solution.status() != SolutionStatus::Optimal {
        std::process::exit(1);
    }
}
