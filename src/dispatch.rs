use std::time::Duration;

use anyhow::{Result, bail};
use futures_util::future::join_all;
use tokio::time::{Instant, sleep, timeout};
use tracing::{info, warn};

use crate::model::{GridPoint, PointResult};
use crate::search::SearchProvider;

pub const DEADLINE_EXCEEDED: &str = "run deadline exceeded";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub batch_size: usize,
    pub point_timeout: Duration,
    pub inter_batch_delay: Duration,
    pub deadline: Option<Duration>,
    pub max_results: usize,
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub point_results: Vec<PointResult>,
    pub batches_run: usize,
    pub deadline_hit: bool,
}

impl DispatchOutcome {
    pub fn successful_points(&self) -> usize {
        self.point_results
            .iter()
            .filter(|result| result.is_success())
            .count()
    }
}

pub async fn dispatch<P: SearchProvider>(
    provider: &P,
    term: &str,
    points: &[GridPoint],
    config: &DispatchConfig,
) -> Result<DispatchOutcome> {
    if config.batch_size == 0 {
        bail!("batch size must be at least 1");
    }
    if config.max_results == 0 {
        bail!("max results must be at least 1");
    }
    let term = term.trim();
    if term.is_empty() {
        bail!("search term must not be empty");
    }

    let started = Instant::now();
    let total_batches = points.len().div_ceil(config.batch_size);
    let mut point_results = Vec::with_capacity(points.len());
    let mut batches_run = 0usize;
    let mut deadline_hit = false;

    for (batch_index, batch) in points.chunks(config.batch_size).enumerate() {
        if config
            .deadline
            .is_some_and(|deadline| started.elapsed() >= deadline)
        {
            let remaining = &points[batch_index * config.batch_size..];
            warn!(
                skipped_points = remaining.len(),
                batches_run, "run deadline exceeded; remaining points recorded as failed"
            );
            point_results.extend(
                remaining
                    .iter()
                    .map(|point| PointResult::failure(*point, DEADLINE_EXCEEDED)),
            );
            deadline_hit = true;
            break;
        }

        info!(
            provider = provider.name(),
            batch = batch_index + 1,
            total_batches,
            points = batch.len(),
            "dispatching batch"
        );

        let calls = batch
            .iter()
            .map(|point| search_point(provider, term, point, config));
        let settled = join_all(calls).await;

        let succeeded = settled.iter().filter(|result| result.is_success()).count();
        info!(
            batch = batch_index + 1,
            succeeded,
            failed = settled.len() - succeeded,
            "batch settled"
        );

        point_results.extend(settled);
        batches_run += 1;

        if batch_index + 1 < total_batches && !config.inter_batch_delay.is_zero() {
            sleep(config.inter_batch_delay).await;
        }
    }

    Ok(DispatchOutcome {
        point_results,
        batches_run,
        deadline_hit,
    })
}

async fn search_point<P: SearchProvider>(
    provider: &P,
    term: &str,
    point: &GridPoint,
    config: &DispatchConfig,
) -> PointResult {
    match timeout(config.point_timeout, provider.search(term, point)).await {
        Ok(Ok(listings)) if listings.is_empty() => {
            warn!(grid_index = point.index, "search returned no results");
            PointResult::failure(*point, "search returned no results")
        }
        Ok(Ok(mut listings)) => {
            listings.truncate(config.max_results);
            PointResult::success(*point, listings)
        }
        Ok(Err(error)) => {
            warn!(grid_index = point.index, error = %format!("{error:#}"), "search failed");
            PointResult::failure(*point, format!("{error:#}"))
        }
        Err(_) => {
            let timeout_ms = config.point_timeout.as_millis();
            warn!(grid_index = point.index, timeout_ms, "search timed out");
            PointResult::failure(*point, format!("timed out after {timeout_ms} ms"))
        }
    }
}
