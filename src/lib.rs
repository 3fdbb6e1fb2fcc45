//! trackfuse - multi-format geospatial interchange engine
//!
//! trackfuse detects which location-history schema a JSON export uses,
//! normalizes every supported GPS file format into one canonical Point/Path
//! model, deduplicates and merges overlapping exports, derives travel
//! statistics and mileage ledgers, and re-serializes the canonical model into
//! standard GPS formats.
//!
//! The pipeline is a pure, stateless transform: input bytes in, canonical
//! model or serialized bytes out. Nothing is persisted and no state crosses
//! call boundaries.
//!
//! ## Modules
//!
//! - **detector / normalizers**: classify a JSON document into one of the
//!   location-history schema variants and normalize it
//! - **codec**: decode/encode GPX, KML, KMZ, GeoJSON, CSV, FIT, and TCX
//! - **dedup**: near-duplicate collapse and multi-file merging with overlap
//!   reports
//! - **stats / mileage**: travel statistics and driving mileage ledgers
//! - **splitter**: partition a point stream and package the parts as a ZIP

pub mod codec;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod geomath;
pub mod mileage;
pub mod normalizers;
pub mod pipeline;
pub mod splitter;
pub mod stats;
pub mod types;

pub use codec::{decode, encode, EncodeOptions, FileFormat};
pub use dedup::{dedup, merge, DedupOptions, DedupResult};
pub use detector::{detect_format, TimelineFormat};
pub use error::{GeoError, Result};
pub use mileage::{generate_mileage_log, mileage_csv, MileageOptions};
pub use pipeline::{convert, convert_batch, convert_to, detect, FileOutcome};
pub use splitter::{package_zip, split, Chunk, DateGranularity, SplitStrategy};
pub use stats::{calculate_travel_stats, StatsOptions, TravelStats};
pub use types::{
    DistanceUnit, MergeResult, MileageLog, OverlapReport, ParsedFile, Point, PointKind, TrackPath,
    Trip,
};

/// Crate version embedded in CLI output
pub const TRACKFUSE_VERSION: &str = env!("CARGO_PKG_VERSION");
