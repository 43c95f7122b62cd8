//! Volume-integral acoustics simulator
//!
//! Two runs are available:
//! - `hifu`: fundamental and nonlinear harmonics of a focused bowl transducer
//! - `sphere`: plane-wave scattering by a penetrable sphere, checked against
//!   the Mie series on the central slice
//!
//! Usage:
//!   cargo run --release --bin vie-simulator -- hifu --config math-vie/configs/h101.json
//!   cargo run --release --bin vie-simulator -- sphere --output sphere.json
//!   cargo run --release --bin vie-simulator -- --help

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use math_audio_vie::config::{HifuConfig, ScatteringConfig};
use math_audio_vie::output::{self, HifuOutput, ScatteringOutput};
use math_audio_vie::{ScatteringSolution, VoxelGrid, hifu, parallel};
use math_audio_wave::analytical::{PenetrableSphere, Point};
use num_complex::Complex64;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "vie-simulator")]
#[command(about = "Voxel volume-integral acoustics: focused ultrasound and sphere scattering", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Number of parallel threads (default: all cores)
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Nonlinear field of a focused bowl transducer
    Hifu {
        /// Path to JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output JSON file path
        #[arg(short, long, default_value = "hifu.json")]
        output: PathBuf,
    },
    /// Plane-wave scattering by a penetrable sphere
    Sphere {
        /// Path to JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output JSON file path
        #[arg(short, long, default_value = "sphere.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to set thread pool")?;
    }
    println!("Using {} worker threads\n", parallel::worker_count());

    match args.command {
        Command::Hifu { config, output } => run_hifu(config, output),
        Command::Sphere { config, output } => run_sphere(config, output),
    }
}

fn run_hifu(config_path: Option<PathBuf>, output_path: PathBuf) -> Result<()> {
    let config = match &config_path {
        Some(path) => {
            println!("Loading configuration from: {}", path.display());
            HifuConfig::from_file(path)
                .with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            println!("No configuration file specified, using the default bowl in water");
            HifuConfig::default()
        }
    };

    println!("\n=== HIFU Configuration ===");
    println!("Frequency: {:.3} MHz", config.frequency * 1e-6);
    println!(
        "Bowl: F = {:.1} mm, aperture = {:.1} mm, hole = {:.1} mm",
        config.transducer.focal_length * 1e3,
        config.transducer.outer_diameter * 1e3,
        config.transducer.inner_diameter * 1e3
    );
    println!("Power: {:.1} W", config.power);
    println!("Harmonics: {}", config.num_harmonics);

    let started = Instant::now();
    let result = hifu::simulate(&config)?;
    println!("\n=== Results ===");
    print_grid(&result.grid);
    println!("Point sources: {}", result.source_count);
    println!("Source amplitude: {:.4e} Pa", result.amplitude);
    for (h, field) in result.harmonics.fields().iter().enumerate() {
        let peak = field.iter().map(|v| v.norm()).fold(0.0, f64::max);
        println!(
            "  {:.2} MHz: max |p| = {:.4e} Pa",
            result.harmonics.frequency(h) * 1e-6,
            peak
        );
    }
    println!("Total time: {:.2?}", started.elapsed());

    println!("\nSaving results to: {}", output_path.display());
    output::write_json(&HifuOutput::new(&result), &output_path)?;
    println!("Done!");
    Ok(())
}

fn run_sphere(config_path: Option<PathBuf>, output_path: PathBuf) -> Result<()> {
    let config = match &config_path {
        Some(path) => {
            println!("Loading configuration from: {}", path.display());
            ScatteringConfig::from_file(path)
                .with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            println!("No configuration file specified, using the default sphere");
            ScatteringConfig::default()
        }
    };

    println!("\n=== Sphere Configuration ===");
    println!("Radius: {:.3} mm", config.radius * 1e3);
    println!("Refractive index: {:.3}", config.refractive_index());
    println!(
        "Density: {:.3} inside, {:.3} outside",
        config.density_interior, config.density_exterior
    );
    println!("ka = {:.3}", config.wavenumber() * config.radius);

    let problem = config.problem()?;
    print_grid(problem.grid());

    let started = Instant::now();
    let solution = problem.solve(&config.solver.gmres())?;
    println!("\n=== Results ===");
    println!("GMRES: {:?}", solution.status);
    println!("Iterations: {}", solution.iterations);
    println!("Relative residual: {:.3e}", solution.residual);
    println!("Solve time: {:.2?}", started.elapsed());

    let slice_error = mie_slice_error(&config, problem.grid(), &solution);
    match slice_error {
        Some(err) => println!("Central-slice error vs Mie series: {:.2}%", 100.0 * err),
        None => println!("Mie comparison skipped (absorbing sphere or off-axis incidence)"),
    }

    println!("\nSaving results to: {}", output_path.display());
    output::write_json(
        &ScatteringOutput::new(problem.grid(), &solution, slice_error),
        &output_path,
    )?;
    println!("Done!");
    Ok(())
}

/// Relative L2 error on the central slice, when the Mie series applies
fn mie_slice_error(
    config: &ScatteringConfig,
    grid: &VoxelGrid,
    solution: &ScatteringSolution,
) -> Option<f64> {
    let [dx, dy, dz] = config.direction;
    let along_x = dx > 0.0 && dy == 0.0 && dz == 0.0;
    if config.refractive_index_imag != 0.0 || !along_x {
        return None;
    }

    let sphere = PenetrableSphere::new(
        config.radius,
        config.wavenumber(),
        config.refractive_index,
        config.density_interior,
        config.density_exterior,
    );
    let points: Vec<Point> = output::central_slice_points(grid)
        .into_iter()
        .map(Point::from)
        .collect();
    let exact = sphere.evaluate(points);
    let computed: Vec<Complex64> = output::central_slice(grid, &solution.total_field)
        .iter()
        .copied()
        .collect();
    Some(exact.relative_l2_error(&computed))
}

fn print_grid(grid: &VoxelGrid) {
    let (l, m, n) = grid.shape();
    println!(
        "Grid: {} x {} x {} = {} voxels at dx = {:.3e} m",
        l,
        m,
        n,
        grid.num_voxels(),
        grid.dx()
    );
}
