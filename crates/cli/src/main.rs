//! vegcover CLI - Vegetation cover analysis from red and near-infrared bands

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vegcover_algorithms::classification::{classify, Classification};
use vegcover_algorithms::imagery::compute_index;
use vegcover_algorithms::pipeline::{analyze, AnalysisConfig};
use vegcover_algorithms::statistics::{
    class_statistics, quantify_with_transform, AreaStats, ClassIndexStats,
};
use vegcover_core::io::{load_band_pair, read_geotiff, write_geotiff, GeoTiffOptions, GeoTiffSource};
use vegcover_core::{ClassId, Raster, CLASS_NODATA};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vegcover")]
#[command(author, version, about = "Vegetation cover analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute the vegetation index from red and NIR bands
    Ndvi {
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// NIR band file
        #[arg(long)]
        nir: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Classify an index raster into ordered classes and report their area
    Classify {
        /// Input index raster
        input: PathBuf,
        /// Output class raster (nodata -1)
        output: PathBuf,
        #[command(flatten)]
        kmeans: KmeansArgs,
    },
    /// Run index, classification and area quantification in one go
    Analyze {
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// NIR band file
        #[arg(long)]
        nir: PathBuf,
        /// Also write the index raster here
        #[arg(long)]
        index_out: Option<PathBuf>,
        /// Also write the class raster here
        #[arg(long)]
        classes_out: Option<PathBuf>,
        #[command(flatten)]
        kmeans: KmeansArgs,
    },
}

#[derive(Args)]
struct KmeansArgs {
    /// Number of classes [default: 4]
    #[arg(short, long)]
    k: Option<usize>,
    /// Random seed for centroid initialization [default: 42]
    #[arg(long)]
    seed: Option<u64>,
    /// Number of k-means initializations [default: 10]
    #[arg(long)]
    n_init: Option<usize>,
    /// JSON parameter file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_band(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_pair(red: &Path, nir: &Path) -> Result<(Raster<f64>, Raster<f64>)> {
    let pb = spinner("Reading bands...");
    let bands = load_band_pair(&GeoTiffSource, red, nir).context("Failed to load band pair")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", bands.0.cols(), bands.0.rows());
    Ok(bands)
}

fn write_result<T: vegcover_core::RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Defaults, then the config file, then explicit flags
fn resolve_config(args: &KmeansArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config {}", path.display()))?;
            serde_json::from_reader(file)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(k) = args.k {
        config.kmeans.k = k;
    }
    if let Some(seed) = args.seed {
        config.kmeans.seed = seed;
    }
    if let Some(n_init) = args.n_init {
        config.kmeans.n_init = n_init;
    }
    Ok(config)
}

fn print_table(
    classification: &Classification,
    areas: &AreaStats,
    class_stats: &BTreeMap<ClassId, ClassIndexStats>,
) {
    if classification.was_reduced() {
        println!(
            "Note: {} classes requested, {} produced (too few distinct index values)",
            classification.requested_k, classification.actual_k
        );
    }
    println!(
        "Coordinate regime: {:?} (pixel area {:.6} km²)",
        areas.regime, areas.pixel_area_km2
    );
    println!();
    println!(
        "{:>5}  {:>8}  {:>10}  {:>10}  {:>12}",
        "Class", "Center", "Mean index", "Pixels", "Area (km²)"
    );
    for (id, area) in areas.iter() {
        let center = classification.centers.get(id as usize).copied().unwrap_or(f64::NAN);
        let mean = class_stats.get(&id).map_or(f64::NAN, |s| s.mean);
        println!(
            "{:>5}  {:>8.4}  {:>10.4}  {:>10}  {:>12.4}",
            id, center, mean, area.pixel_count, area.area_km2
        );
    }
    println!(
        "{:>5}  {:>8}  {:>10}  {:>10}  {:>12.4}",
        "Total", "", "", areas.classified_pixels(), areas.total_area_km2()
    );
    if areas.unclassified_pixels > 0 {
        println!("Unclassified pixels: {}", areas.unclassified_pixels);
    }
}

fn print_json(
    classification: &Classification,
    areas: &AreaStats,
    class_stats: &BTreeMap<ClassId, ClassIndexStats>,
    index_range: Option<(f64, f64)>,
) -> Result<()> {
    let classes: Vec<_> = areas
        .iter()
        .map(|(id, area)| {
            json!({
                "class": id,
                "center": classification.centers.get(id as usize),
                "pixel_count": area.pixel_count,
                "area_km2": area.area_km2,
                "index": class_stats.get(&id),
            })
        })
        .collect();

    let report = json!({
        "requested_k": classification.requested_k,
        "actual_k": classification.actual_k,
        "centers": classification.centers,
        "inertia": classification.inertia,
        "index_range": index_range.map(|(lo, hi)| [lo, hi]),
        "regime": areas.regime,
        "pixel_area_km2": areas.pixel_area_km2,
        "unclassified_pixels": areas.unclassified_pixels,
        "total_area_km2": areas.total_area_km2(),
        "classes": classes,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_band(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            let (px, py) = raster.transform().pixel_size();
            println!("Pixel size: {} x {}", px, py);
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Index ────────────────────────────────────────────────────
        Commands::Ndvi { red, nir, output } => {
            let (red_r, nir_r) = read_pair(&red, &nir)?;
            let start = Instant::now();
            let result = compute_index(&red_r, &nir_r).context("Failed to calculate NDVI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("NDVI", &output, elapsed);
        }

        // ── Classification ───────────────────────────────────────────
        Commands::Classify {
            input,
            output,
            kmeans,
        } => {
            let config = resolve_config(&kmeans)?;
            let index = read_band(&input)?;
            let start = Instant::now();
            let classification =
                classify(&index, &config.kmeans).context("Failed to classify index")?;
            let areas =
                quantify_with_transform(&classification.map, classification.map.transform());
            let class_stats = class_statistics(&index, &classification.map)
                .context("Failed to compute class statistics")?;
            let elapsed = start.elapsed();
            write_result(&classification.map.to_raster(CLASS_NODATA), &output)?;

            if kmeans.json {
                let stats = index.statistics();
                let range = stats.min.zip(stats.max);
                print_json(&classification, &areas, &class_stats, range)?;
            } else {
                print_table(&classification, &areas, &class_stats);
                println!();
                done("Classes", &output, elapsed);
            }
        }

        // ── Full pipeline ────────────────────────────────────────────
        Commands::Analyze {
            red,
            nir,
            index_out,
            classes_out,
            kmeans,
        } => {
            let config = resolve_config(&kmeans)?;
            let (red_r, nir_r) = read_pair(&red, &nir)?;
            let start = Instant::now();
            let analysis = analyze(&red_r, &nir_r, &config).context("Analysis failed")?;
            let elapsed = start.elapsed();

            if let Some(path) = &index_out {
                write_result(&analysis.index, path)?;
                info!("Index saved to: {}", path.display());
            }
            if let Some(path) = &classes_out {
                write_result(&analysis.classification.map.to_raster(CLASS_NODATA), path)?;
                info!("Classes saved to: {}", path.display());
            }

            if kmeans.json {
                print_json(
                    &analysis.classification,
                    &analysis.areas,
                    &analysis.class_stats,
                    analysis.index_range,
                )?;
            } else {
                if let Some((lo, hi)) = analysis.index_range {
                    println!("Index range: {:.4} to {:.4}", lo, hi);
                }
                print_table(&analysis.classification, &analysis.areas, &analysis.class_stats);
                println!("  Processing time: {:.2?}", elapsed);
            }
        }
    }

    Ok(())
}
