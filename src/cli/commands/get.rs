//! Get command - fetch artifacts through one process-scoped cache

use crate::cache::CacheStats;
use crate::cli::args::{GetArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::facade::ArtifactCache;
use crate::loader::{FileArtifact, FsLoader};
use crate::resolver::CatalogResolver;
use console::style;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Outcome of one fetch of one name
#[derive(Debug, Serialize)]
struct FetchReport {
    round: u32,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    /// Same loaded copy as the previous round
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the get command
pub async fn execute(args: GetArgs, config: &Config) -> CacheResult<()> {
    let cache = ArtifactCache::new(
        Arc::new(CatalogResolver::new(config.catalog.path.clone())),
        Arc::new(FsLoader::new(config.loader.artifact_dir.clone())),
    )
    .with_lock_wait_timeout(config.cache.lock_wait_timeout());

    let mut reports = Vec::new();
    let mut previous: HashMap<String, Arc<FileArtifact>> = HashMap::new();
    let mut first_error: Option<CacheError> = None;

    for round in 1..=args.rounds {
        if round > 1 && args.interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
        debug!("Round {} of {}", round, args.rounds);

        let results = join_all(args.names.iter().map(|name| cache.get(name))).await;

        for (name, result) in args.names.iter().zip(results) {
            match result {
                Ok(artifact) => {
                    let cached = previous
                        .get(name)
                        .is_some_and(|prev| Arc::ptr_eq(prev, &artifact));
                    reports.push(FetchReport {
                        round,
                        name: name.clone(),
                        size: Some(artifact.size()),
                        sha256: Some(artifact.sha256.clone()),
                        cached,
                        error: None,
                    });
                    previous.insert(name.clone(), artifact);
                }
                Err(e) => {
                    reports.push(FetchReport {
                        round,
                        name: name.clone(),
                        size: None,
                        sha256: None,
                        cached: false,
                        error: Some(e.to_string()),
                    });
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    let stats = cache.stats();
    match args.format {
        OutputFormat::Table => print_table(&reports, &stats),
        OutputFormat::Json => print_json(&reports, &stats)?,
        OutputFormat::Plain => print_plain(&reports),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn print_table(reports: &[FetchReport], stats: &CacheStats) {
    println!(
        "{:<6} {:<40} {:<10} {:<10} {:<16}",
        "ROUND", "NAME", "SOURCE", "SIZE", "SHA256"
    );
    println!("{}", "-".repeat(86));

    for report in reports {
        let source = match (&report.error, report.cached) {
            (Some(_), _) => style("error").red().to_string(),
            (None, true) => style("cache").green().to_string(),
            (None, false) => style("loaded").yellow().to_string(),
        };
        let size = report.size.map(|s| s.to_string()).unwrap_or_default();
        let digest = report
            .sha256
            .as_deref()
            .map(|d| &d[..d.len().min(16)])
            .or(report.error.as_deref())
            .unwrap_or_default();

        println!(
            "{:<6} {:<40} {:<10} {:<10} {:<16}",
            report.round, report.name, source, size, digest
        );
    }

    println!();
    println!(
        "Hits: {}  Loads: {}  Refreshes: {}  Failures: {}",
        stats.hits, stats.misses, stats.refreshes, stats.failures
    );
}

fn print_json(reports: &[FetchReport], stats: &CacheStats) -> CacheResult<()> {
    #[derive(Serialize)]
    struct Output<'a> {
        reports: &'a [FetchReport],
        stats: &'a CacheStats,
    }

    let json = serde_json::to_string_pretty(&Output { reports, stats })?;
    println!("{}", json);
    Ok(())
}

fn print_plain(reports: &[FetchReport]) {
    for report in reports {
        match (&report.sha256, &report.error) {
            (Some(digest), _) => println!("{} {}", report.name, digest),
            (None, Some(error)) => println!("{} error: {}", report.name, error),
            (None, None) => println!("{}", report.name),
        }
    }
}
