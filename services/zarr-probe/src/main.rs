//! Remote Zarr store inspector.
//!
//! Opens a consolidated Zarr v2 store over HTTP, S3 or a local directory,
//! prints the hierarchy below a path and, for a dataset, reads a slice of
//! it and prints a summary.

mod report;
mod source;

use std::ops::Range;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use zarr_remote::{DataOptions, StoreConfig};

use report::DataSummary;
use source::StoreSource;

#[derive(Parser, Debug)]
#[command(name = "zarr-probe")]
#[command(about = "Inspect a remote consolidated Zarr v2 store")]
struct Args {
    /// Store location: http(s)://..., s3://bucket/prefix, or a directory
    #[arg(env = "ZARR_STORE_URL")]
    location: StoreSource,

    /// Group or dataset to inspect
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Range `start:end` of one leading dimension; repeat for more dimensions
    #[arg(short, long = "slice", value_parser = parse_range)]
    slices: Vec<Range<u64>>,

    /// Bypass intermediary caches for chunk reads
    #[arg(long)]
    cache_bust: bool,

    /// Print the data summary and stats as JSON
    #[arg(long)]
    json: bool,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// Parse `start:end` (half-open). `:end` starts at 0.
fn parse_range(s: &str) -> Result<Range<u64>, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected start:end, got {s:?}"))?;
    let start = if start.is_empty() {
        0
    } else {
        start.parse().map_err(|e| format!("bad start in {s:?}: {e}"))?
    };
    let end: u64 = end.parse().map_err(|e| format!("bad end in {s:?}: {e}"))?;
    if end < start {
        return Err(format!("end before start in {s:?}"));
    }
    Ok(start..end)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing; logs go to stderr so stdout stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    let mut config = StoreConfig::from_env();
    if args.cache_bust {
        config.cache_bust_chunks = true;
    }
    if let Err(e) = config.validate() {
        bail!("invalid configuration: {e}");
    }

    info!(location = ?args.location, path = %args.path, "Opening store");
    let store = args.location.open(config).await?;

    if let Some(group) = store.get_group(&args.path) {
        if !args.slices.is_empty() {
            bail!("{} is a group; --slice applies to datasets", group.path());
        }
        for line in report::tree(&group) {
            println!("{line}");
        }
    } else if let Some(dataset) = store.get_dataset(&args.path) {
        let options = DataOptions::slice(args.slices.clone()).with_cache_bust(args.cache_bust);
        let Some(data) = dataset.read(&options).await? else {
            bail!("dataset {} disappeared while reading", dataset.path());
        };
        let summary = DataSummary::of(&data);

        if args.json {
            let out = serde_json::json!({
                "path": dataset.path(),
                "dtype": dataset.dtype(),
                "summary": summary,
                "stats": store.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        println!(
            "{} {:?} {} chunks {:?}",
            dataset.path(),
            dataset.shape(),
            dataset.dtype(),
            dataset.chunks()
        );
        for (key, value) in dataset.attrs() {
            println!("  @{key} = {}", value.to_json());
        }
        println!("read shape {:?} ({} elements)", summary.shape, summary.len);
        if let (Some(min), Some(max), Some(mean)) = (summary.min, summary.max, summary.mean) {
            println!("min {min} max {max} mean {mean}");
        }
        println!("head {:?}", summary.head);
    } else {
        bail!("nothing at {} in {:?}", args.path, args.location);
    }

    let stats = store.stats();
    info!(
        network_fetches = stats.network_fetches,
        bytes_fetched = stats.bytes_fetched,
        hit_rate = stats.hit_rate(),
        "Done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("23:47"), Ok(23..47));
        assert_eq!(parse_range(":5"), Ok(0..5));
        assert_eq!(parse_range("4:4"), Ok(4..4));
        assert!(parse_range("5:4").is_err());
        assert!(parse_range("12").is_err());
        assert!(parse_range("a:3").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "zarr-probe",
            "https://example.org/s.zarr",
            "--path",
            "/acquisition/data",
            "-s",
            "0:10",
            "-s",
            "1:3",
        ])
        .unwrap();
        assert_eq!(args.slices, vec![0..10, 1..3]);
        assert_eq!(
            args.location,
            StoreSource::Http("https://example.org/s.zarr".into())
        );
    }
}
