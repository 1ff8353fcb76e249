//! The concurrent change-detection sweep.
//!
//! One task per tracked entry, all spawned at sweep start into a
//! `JoinSet`, with admission gated by a semaphore sized from
//! configuration so the number of in-flight fetches stays bounded. Each
//! unit fetches its url, asks the freshness evaluator what changed,
//! applies the store update and archive write, and advances the shared
//! progress bar exactly once. Per-entry failures are printed through the
//! bar's side channel and never fail the sweep; only failing to load the
//! entry set is fatal.

use std::sync::Arc;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::archive::Archive;
use crate::config::Config;
use crate::freshness::{self, Freshness};
use crate::store::{Entry, StoreError, UrlStore};

/// Per-entry outcome of one fetch attempt. Not persisted; drives the
/// end-of-sweep tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Unchanged,
    ChangedByModified,
    ChangedByEtag,
    NoSignal,
    Failed,
}

/// Tally of one full sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub no_signal: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("no entries tracked")]
    NoEntries,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Run one full sweep over all tracked entries.
///
/// Returns `NoEntries` when nothing is tracked (an expected state, not a
/// failure) without issuing any fetches. Otherwise the sweep completes
/// once every unit has finished, however many of them individually
/// failed.
pub fn run(config: &Config, store: &UrlStore) -> Result<SweepSummary, SweepError> {
    let entries = store.list()?;
    let total = store.count()?;
    if entries.is_empty() {
        return Err(SweepError::NoEntries);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(SweepError::Runtime)?;
    runtime.block_on(sweep_all(config, store.clone(), entries, total))
}

async fn sweep_all(
    config: &Config,
    store: UrlStore,
    entries: Vec<Entry>,
    total: u64,
) -> Result<SweepSummary, SweepError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(SweepError::Client)?;
    let archive = Archive::new(&config.archive_dir);
    let bar = progress_bar(total);
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let verbose = config.verbose;

    let mut units = JoinSet::new();
    for entry in entries {
        let client = client.clone();
        let store = store.clone();
        let archive = archive.clone();
        let bar = bar.clone();
        let semaphore = Arc::clone(&semaphore);

        units.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                // the semaphore is never closed while units run
                Err(_) => return Outcome::Failed,
            };
            let outcome = check_entry(&client, &store, &archive, &entry, &bar, verbose).await;
            bar.inc(1);
            outcome
        });
    }

    let mut summary = SweepSummary::default();
    while let Some(joined) = units.join_next().await {
        // a panicked unit counts as failed; its siblings keep going
        let outcome = joined.unwrap_or(Outcome::Failed);
        summary.checked += 1;
        match outcome {
            Outcome::Unchanged => summary.unchanged += 1,
            Outcome::ChangedByModified | Outcome::ChangedByEtag => summary.changed += 1,
            Outcome::NoSignal => summary.no_signal += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }

    bar.finish_and_clear();
    Ok(summary)
}

/// Check one entry: fetch, evaluate, apply side effects. The body is read
/// only when a change was detected, so unchanged entries cost headers
/// only.
async fn check_entry(
    client: &reqwest::Client,
    store: &UrlStore,
    archive: &Archive,
    entry: &Entry,
    bar: &ProgressBar,
    verbose: bool,
) -> Outcome {
    let response = match client.get(&entry.url).send().await {
        Ok(response) => response,
        Err(e) => {
            bar.println(format!("[error] {}: {e}", entry.url));
            return Outcome::Failed;
        }
    };

    let last_modified = header_value(&response, reqwest::header::LAST_MODIFIED);
    let etag = header_value(&response, reqwest::header::ETAG);

    let decision = freshness::evaluate(
        entry.modified,
        &entry.etag,
        last_modified.as_deref(),
        etag.as_deref(),
    );

    match decision {
        Err(e) => {
            bar.println(format!(
                "[error] {}: bad Last-Modified header: {e}",
                entry.url
            ));
            Outcome::Failed
        }
        Ok(Freshness::NoSignal) => {
            bar.println(format!(
                "[warn] {}: no Last-Modified or ETag header, cannot detect changes",
                entry.url
            ));
            Outcome::NoSignal
        }
        Ok(Freshness::Unchanged) => {
            if verbose {
                bar.println(format!("unchanged: {}", entry.url));
            }
            Outcome::Unchanged
        }
        Ok(Freshness::ChangedByEtag { etag: new_etag }) => {
            if let Err(e) = store.update_etag(entry.id, &new_etag) {
                bar.println(format!("[error] {}: {e}", entry.url));
                return Outcome::Failed;
            }
            if !archive_body(archive, entry, response, bar).await {
                return Outcome::Failed;
            }
            bar.println(format!(
                "etag changed: {} ({:?} -> {:?})",
                entry.url, entry.etag, new_etag
            ));
            Outcome::ChangedByEtag
        }
        Ok(Freshness::ChangedByModified { modified }) => {
            if let Err(e) = store.update_modified(entry.id, modified) {
                bar.println(format!("[error] {}: {e}", entry.url));
                return Outcome::Failed;
            }
            if !archive_body(archive, entry, response, bar).await {
                return Outcome::Failed;
            }
            bar.println(format!(
                "modified: {} ({} -> {})",
                entry.url,
                format_timestamp(entry.modified),
                format_timestamp(modified)
            ));
            Outcome::ChangedByModified
        }
    }
}

/// Read the body and archive it. Reports failures through the bar and
/// returns whether the snapshot was written.
async fn archive_body(
    archive: &Archive,
    entry: &Entry,
    response: reqwest::Response,
    bar: &ProgressBar,
) -> bool {
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            bar.println(format!("[error] {}: reading body: {e}", entry.url));
            return false;
        }
    };

    match archive.save(entry.id, Utc::now(), &body) {
        Ok(_) => true,
        Err(e) => {
            bar.println(format!("[error] {}: {e}", entry.url));
            false
        }
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn format_timestamp(timestamp: i64) -> String {
    if timestamp == 0 {
        return "never".to_string();
    }
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.green/dim}] {pos}/{len}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_renders_never_and_dates() {
        assert_eq!(format_timestamp(0), "never");
        assert_eq!(format_timestamp(1_445_412_480), "2015-10-21 07:28:00");
    }
}
