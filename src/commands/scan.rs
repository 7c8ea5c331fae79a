use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use super::area::{ResolvedGrid, resolve_grid};
use super::output::{RankingHeader, write_ranking};
use crate::aggregate::aggregate;
use crate::cli::{ProviderKind, ScanArgs};
use crate::dispatch::{DispatchConfig, dispatch};
use crate::model::{IdentityStrategy, RunExecution, RunManifest, RunParams};
use crate::search::{HttpSearch, Provider, ReplaySearch, SearchProvider};
use crate::store::{open_store, save_run};
use crate::util::{now_utc_string, scan_run_id, sha256_file, write_json_pretty};

const RUN_MANIFEST_VERSION: u32 = 1;

pub fn run(args: ScanArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_async(args))
}

async fn run_async(args: ScanArgs) -> Result<()> {
    let grid = resolve_grid(&args.area)?;
    let provider = build_provider(&args)?;
    let config = dispatch_config(&args);
    let run_id = scan_run_id(Utc::now());

    let manifest = execute_scan(
        &provider,
        &args.term,
        grid,
        &config,
        args.identity.into(),
        run_id,
    )
    .await?;

    let output_path = args.output_path.clone().unwrap_or_else(|| {
        args.cache_root
            .join("runs")
            .join(format!("{}.json", manifest.run_id))
    });
    write_json_pretty(&output_path, &manifest)?;
    let artifact_sha256 = sha256_file(&output_path)?;
    info!(path = %output_path.display(), sha256 = %artifact_sha256, "wrote run artifact");

    if !args.no_store {
        let db_path = args
            .db_path
            .clone()
            .unwrap_or_else(|| default_db_path(&args.cache_root));
        let mut connection = open_store(&db_path)?;
        save_run(
            &mut connection,
            &manifest,
            Some(&output_path),
            Some(&artifact_sha256),
        )?;
        info!(path = %db_path.display(), run_id = %manifest.run_id, "stored run");
    }

    write_ranking(
        &RankingHeader {
            run_id: &manifest.run_id,
            search_term: &manifest.params.search_term,
            grid_dimension: manifest.params.grid_dimension,
        },
        &manifest.aggregate,
        args.limit,
        args.json,
    )
}

pub(crate) fn default_db_path(cache_root: &std::path::Path) -> PathBuf {
    cache_root.join("gridrank.sqlite")
}

fn build_provider(args: &ScanArgs) -> Result<Provider> {
    match args.provider {
        ProviderKind::Http => {
            let Some(endpoint) = args.endpoint.as_deref() else {
                bail!("--endpoint is required for the http provider");
            };
            Ok(Provider::Http(HttpSearch::new(endpoint, args.max_results)?))
        }
        ProviderKind::Replay => {
            let Some(path) = args.replay_path.as_deref() else {
                bail!("--replay-path is required for the replay provider");
            };
            let replay = ReplaySearch::from_manifest_path(path)?;
            if replay.is_empty() {
                bail!("replay artifact has no point results: {}", path.display());
            }
            info!(path = %path.display(), points = replay.len(), "loaded replay artifact");
            Ok(Provider::Replay(replay))
        }
    }
}

fn dispatch_config(args: &ScanArgs) -> DispatchConfig {
    DispatchConfig {
        batch_size: args.batch_size,
        point_timeout: Duration::from_millis(args.point_timeout_ms),
        inter_batch_delay: Duration::from_millis(args.inter_batch_delay_ms),
        deadline: args.deadline_secs.map(Duration::from_secs),
        max_results: args.max_results,
    }
}

pub(crate) async fn execute_scan<P: SearchProvider>(
    provider: &P,
    term: &str,
    grid: ResolvedGrid,
    config: &DispatchConfig,
    identity: IdentityStrategy,
    run_id: String,
) -> Result<RunManifest> {
    let started_at = now_utc_string();
    let started = Instant::now();

    info!(
        run_id = %run_id,
        term = %term.trim(),
        provider = provider.name(),
        points = grid.points.len(),
        batch_size = config.batch_size,
        "scan started"
    );

    let outcome = dispatch(provider, term, &grid.points, config).await?;
    info!(
        run_id = %run_id,
        successful_points = outcome.successful_points(),
        batches_run = outcome.batches_run,
        deadline_hit = outcome.deadline_hit,
        "dispatch settled"
    );
    let aggregate = aggregate(&outcome.point_results, identity)?;
    let duration_ms = started.elapsed().as_millis();

    if aggregate.successful_points == 0 {
        warn!(run_id = %run_id, "no grid point returned results");
    }
    info!(
        run_id = %run_id,
        failed_points = aggregate.failed_points,
        entities = aggregate.total_unique_entities,
        duration_ms,
        "scan complete"
    );

    Ok(RunManifest {
        manifest_version: RUN_MANIFEST_VERSION,
        run_id,
        generated_at: now_utc_string(),
        params: RunParams {
            search_term: term.trim().to_string(),
            center: grid.center,
            area: grid.area,
            grid_dimension: grid.dimension,
            batch_size: config.batch_size,
            point_timeout_ms: config.point_timeout.as_millis() as u64,
            inter_batch_delay_ms: config.inter_batch_delay.as_millis() as u64,
            deadline_secs: config.deadline.map(|deadline| deadline.as_secs()),
            max_results: config.max_results,
            identity_strategy: identity.as_str().to_string(),
            provider: provider.name().to_string(),
        },
        execution: RunExecution {
            started_at,
            duration_ms,
            total_points: grid.points.len(),
            successful_points: aggregate.successful_points,
            failed_points: aggregate.failed_points,
            batches_run: outcome.batches_run,
            deadline_hit: outcome.deadline_hit,
        },
        point_results: outcome.point_results,
        aggregate,
    })
}
