//! CLI interface for the GNAT index

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gnat::{DistanceMetric, Gnat, GnatConfig, Point, SearchResult};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gnat")]
#[command(about = "Nearest-neighbor queries over a point file with a GNAT index", long_about = None)]
struct Cli {
    /// JSON file with tree configuration. Missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Distance metric
    #[arg(long, value_enum, default_value = "euclidean")]
    metric: MetricArg,

    /// Seed for pivot sampling (overrides the configuration file)
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum MetricArg {
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl From<MetricArg> for DistanceMetric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Euclidean => DistanceMetric::Euclidean,
            MetricArg::Manhattan => DistanceMetric::Manhattan,
            MetricArg::Chebyshev => DistanceMetric::Chebyshev,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Find the closest point to a query
    Nearest {
        /// Point file, one point per line
        points: PathBuf,
        /// Query point as comma-separated values (e.g., "1.0,2.0")
        query: String,
    },
    /// Find the k closest points to a query
    Knn {
        /// Point file, one point per line
        points: PathBuf,
        /// Query point as comma-separated values (e.g., "1.0,2.0")
        query: String,
        /// Number of results to return
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
    /// Find every point within a radius of a query
    Radius {
        /// Point file, one point per line
        points: PathBuf,
        /// Query point as comma-separated values (e.g., "1.0,2.0")
        query: String,
        /// Search radius (inclusive)
        #[arg(short, long)]
        radius: f64,
    },
    /// Print the shape of the tree built over a point file
    Stats {
        /// Point file, one point per line
        points: PathBuf,
    },
}

impl Commands {
    fn points(&self) -> &PathBuf {
        match self {
            Commands::Nearest { points, .. }
            | Commands::Knn { points, .. }
            | Commands::Radius { points, .. }
            | Commands::Stats { points } => points,
        }
    }
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results found");
        return;
    }
    println!("{} results:", results.len());
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. {} [{}] (distance: {:.4})",
            i + 1,
            result.id,
            result.point,
            result.distance
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("gnat=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GnatConfig::from_json_file(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?,
        None => GnatConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }

    let mut index = Gnat::with_metric(config, DistanceMetric::from(cli.metric))?;
    let path = cli.command.points();
    index
        .load(path)
        .with_context(|| format!("loading points from {}", path.display()))?;

    match cli.command {
        Commands::Nearest { query, .. } => {
            let q = Point::from_str(&query)?;
            print_results(&[index.nearest(&q)?]);
        }
        Commands::Knn { query, k, .. } => {
            let q = Point::from_str(&query)?;
            print_results(&index.nearest_k(&q, k)?);
        }
        Commands::Radius { query, radius, .. } => {
            let q = Point::from_str(&query)?;
            print_results(&index.nearest_r(&q, radius)?);
        }
        Commands::Stats { .. } => {
            let stats = index.stats();
            println!("Live points:    {}", stats.live);
            println!("Nodes:          {}", stats.nodes);
            println!("Leaves:         {}", stats.leaves);
            println!("Internal nodes: {}", stats.internal_nodes);
            println!("Depth:          {}", stats.depth);
            println!("Children:       {}..={}", stats.min_children, stats.max_children);
            println!("Largest bucket: {}", stats.max_bucket);
        }
    }
    Ok(())
}
