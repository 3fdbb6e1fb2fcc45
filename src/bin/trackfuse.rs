//! trackfuse CLI
//!
//! Commands:
//! - detect: sniff the location-history schema of a JSON file
//! - convert: convert one file into another GPS format
//! - merge: merge several exports, dedup, and report overlaps
//! - stats: compute travel statistics over one or more files
//! - mileage: build a driving mileage ledger
//! - split: partition a file and package the chunks as a ZIP

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use trackfuse::codec::{EncodeOptions, FileFormat};
use trackfuse::splitter::{DateGranularity, SplitStrategy};
use trackfuse::types::DistanceUnit;
use trackfuse::{dedup, mileage, pipeline, splitter, stats, TRACKFUSE_VERSION};

/// trackfuse - multi-format geospatial interchange engine
#[derive(Parser)]
#[command(name = "trackfuse")]
#[command(version = TRACKFUSE_VERSION)]
#[command(about = "Convert, merge, and analyze location history and GPS files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sniff the location-history schema of a JSON file
    Detect {
        /// Input file path
        input: PathBuf,
    },

    /// Convert one file into another GPS format
    Convert {
        /// Input file path
        input: PathBuf,

        /// Output file path; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,

        /// Override the output format instead of using the extension
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Document name written into output metadata
        #[arg(long)]
        name: Option<String>,
    },

    /// Merge several exports, dedup the union, and report overlaps
    Merge {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file path for the merged data
        #[arg(short, long)]
        output: PathBuf,

        /// Dedup distance threshold in meters
        #[arg(long, default_value = "50")]
        distance_threshold: f64,

        /// Dedup time threshold in seconds
        #[arg(long, default_value = "60")]
        time_threshold: f64,
    },

    /// Compute travel statistics over one or more files
    Stats {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Distance-jump exclusion threshold in meters
        #[arg(long, default_value = "500000")]
        max_jump: f64,
    },

    /// Build a driving mileage ledger
    Mileage {
        /// Input file paths
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Distance unit
        #[arg(long, default_value = "km")]
        unit: UnitArg,

        /// Only include trips on or after this date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<chrono::NaiveDate>,

        /// Only include trips on or before this date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<chrono::NaiveDate>,

        /// Emit CSV instead of JSON
        #[arg(long)]
        csv: bool,
    },

    /// Partition a file and package the chunks as a ZIP archive
    Split {
        /// Input file path
        input: PathBuf,

        /// Output ZIP path
        #[arg(short, long)]
        output: PathBuf,

        /// Chunk format
        #[arg(long, default_value = "gpx")]
        format: OutputFormat,

        /// Points per chunk (count strategy)
        #[arg(long, conflicts_with_all = ["size", "by_year", "by_month"])]
        count: Option<usize>,

        /// Target chunk size in bytes (size strategy)
        #[arg(long, conflicts_with_all = ["by_year", "by_month"])]
        size: Option<usize>,

        /// Bucket points by calendar year
        #[arg(long, conflicts_with = "by_month")]
        by_year: bool,

        /// Bucket points by year-month
        #[arg(long)]
        by_month: bool,

        /// Base name for archive entries (defaults to the input stem)
        #[arg(long)]
        base: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Gpx,
    Kml,
    Kmz,
    Geojson,
    Csv,
}

impl From<OutputFormat> for FileFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Gpx => FileFormat::Gpx,
            OutputFormat::Kml => FileFormat::Kml,
            OutputFormat::Kmz => FileFormat::Kmz,
            OutputFormat::Geojson => FileFormat::GeoJson,
            OutputFormat::Csv => FileFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Km,
    Miles,
}

impl From<UnitArg> for DistanceUnit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Km => DistanceUnit::Kilometers,
            UnitArg::Miles => DistanceUnit::Miles,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect { input } => cmd_detect(&input),
        Commands::Convert {
            input,
            output,
            format,
            name,
        } => cmd_convert(&input, &output, format, name),
        Commands::Merge {
            inputs,
            output,
            distance_threshold,
            time_threshold,
        } => cmd_merge(&inputs, &output, distance_threshold, time_threshold),
        Commands::Stats { inputs, max_jump } => cmd_stats(&inputs, max_jump),
        Commands::Mileage {
            inputs,
            unit,
            start_date,
            end_date,
            csv,
        } => cmd_mileage(&inputs, unit, start_date, end_date, csv),
        Commands::Split {
            input,
            output,
            format,
            count,
            size,
            by_year,
            by_month,
            base,
        } => cmd_split(&input, &output, format, count, size, by_year, by_month, base),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_detect(input: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(input)?;
    let format = pipeline::detect(&bytes)?;
    println!("{}", format.as_str());
    Ok(())
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    format: Option<OutputFormat>,
    name: Option<String>,
) -> anyhow::Result<()> {
    let bytes = fs::read(input)?;
    let output_format = match format {
        Some(f) => f.into(),
        None => format_from_path(output)?,
    };

    let options = EncodeOptions {
        document_name: name.unwrap_or_else(|| stem_of(input)),
    };
    let encoded = pipeline::convert_to(&bytes, &name_of(input), output_format, &options)?;
    fs::write(output, encoded)?;
    eprintln!("wrote {}", output.display());
    Ok(())
}

fn cmd_merge(
    inputs: &[PathBuf],
    output: &Path,
    distance_threshold: f64,
    time_threshold: f64,
) -> anyhow::Result<()> {
    let mut files = Vec::new();
    for path in inputs {
        let bytes = fs::read(path)?;
        match pipeline::convert(&bytes, &name_of(path)) {
            Ok(parsed) => files.push((name_of(path), parsed)),
            Err(e) => eprintln!("skipping {}: {e}", path.display()),
        }
    }

    let options = dedup::DedupOptions {
        distance_threshold_meters: distance_threshold,
        time_threshold_seconds: time_threshold,
    };
    let result = dedup::merge(&files, &options);

    eprintln!(
        "merged {} points from {} files ({} duplicates removed)",
        result.metadata.total_output_points,
        files.len(),
        result.metadata.duplicates_removed
    );
    for overlap in &result.metadata.overlaps {
        eprintln!(
            "overlap: {} and {} share {} day(s)",
            overlap.file_a, overlap.file_b, overlap.overlap_days
        );
    }

    let output_format = format_from_path(output)?;
    let encoded = trackfuse::encode(
        &result.points,
        &result.paths,
        output_format,
        &EncodeOptions {
            document_name: stem_of(output),
        },
    )?;
    fs::write(output, encoded)?;
    eprintln!("wrote {}", output.display());
    Ok(())
}

fn cmd_stats(inputs: &[PathBuf], max_jump: f64) -> anyhow::Result<()> {
    let (points, paths) = load_all(inputs)?;
    let stats = stats::calculate_travel_stats(
        &points,
        &paths,
        &stats::StatsOptions {
            max_jump_meters: max_jump,
        },
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_mileage(
    inputs: &[PathBuf],
    unit: UnitArg,
    start_date: Option<chrono::NaiveDate>,
    end_date: Option<chrono::NaiveDate>,
    csv: bool,
) -> anyhow::Result<()> {
    let (points, paths) = load_all(inputs)?;
    let log = mileage::generate_mileage_log(
        &points,
        &paths,
        &mileage::MileageOptions {
            start_date,
            end_date,
            unit: unit.into(),
        },
    );

    if csv {
        print!("{}", mileage::mileage_csv(&log)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&log)?);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_split(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    count: Option<usize>,
    size: Option<usize>,
    by_year: bool,
    by_month: bool,
    base: Option<String>,
) -> anyhow::Result<()> {
    let bytes = fs::read(input)?;
    let parsed = pipeline::convert(&bytes, &name_of(input))?;
    if parsed.is_empty() {
        anyhow::bail!("no usable data in {}", input.display());
    }

    let strategy = if by_month {
        SplitStrategy::ByDate {
            granularity: DateGranularity::Month,
        }
    } else if by_year {
        SplitStrategy::ByDate {
            granularity: DateGranularity::Year,
        }
    } else if let Some(target_bytes) = size {
        SplitStrategy::BySize { target_bytes }
    } else {
        SplitStrategy::ByCount {
            points_per_chunk: count.unwrap_or(5_000),
        }
    };

    let chunk_format: FileFormat = format.into();
    let base_name = base.unwrap_or_else(|| stem_of(input));
    let chunks = splitter::split(&parsed.points, &strategy, chunk_format);
    let archive = splitter::package_zip(&chunks, chunk_format, &base_name)?;
    fs::write(output, archive)?;
    eprintln!("wrote {} ({} chunks)", output.display(), chunks.len());
    Ok(())
}

fn load_all(inputs: &[PathBuf]) -> anyhow::Result<(Vec<trackfuse::Point>, Vec<trackfuse::TrackPath>)> {
    let mut points = Vec::new();
    let mut paths = Vec::new();
    for path in inputs {
        let bytes = fs::read(path)?;
        match pipeline::convert(&bytes, &name_of(path)) {
            Ok(mut parsed) => {
                points.append(&mut parsed.points);
                paths.append(&mut parsed.paths);
            }
            Err(e) => eprintln!("skipping {}: {e}", path.display()),
        }
    }
    Ok((points, paths))
}

fn format_from_path(path: &Path) -> anyhow::Result<FileFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(FileFormat::from_extension)
        .ok_or_else(|| anyhow::anyhow!("cannot infer format from {}", path.display()))
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "trackfuse".to_string())
}
