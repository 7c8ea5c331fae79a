use anyhow::Result;
use tracing::{info, warn};

use super::output::{RankingHeader, write_ranking};
use crate::aggregate::aggregate;
use crate::cli::RankArgs;
use crate::model::{AggregateSummary, IdentityStrategy, RunManifest};
use crate::util::read_json;

pub fn run(args: RankArgs) -> Result<()> {
    let manifest: RunManifest = read_json(&args.artifact)?;
    let strategy = resolve_strategy(args.identity.map(IdentityStrategy::from), &manifest);

    let summary = aggregate(&manifest.point_results, strategy)?;
    if same_ranking(&summary, &manifest.aggregate) {
        info!(run_id = %manifest.run_id, "re-aggregated ranking matches stored ranking");
    } else {
        warn!(
            run_id = %manifest.run_id,
            identity = strategy.as_str(),
            "re-aggregated ranking differs from stored ranking"
        );
    }

    write_ranking(
        &RankingHeader {
            run_id: &manifest.run_id,
            search_term: &manifest.params.search_term,
            grid_dimension: manifest.params.grid_dimension,
        },
        &summary,
        args.limit,
        args.json,
    )
}

fn resolve_strategy(
    requested: Option<IdentityStrategy>,
    manifest: &RunManifest,
) -> IdentityStrategy {
    if let Some(strategy) = requested {
        return strategy;
    }
    IdentityStrategy::parse(&manifest.params.identity_strategy).unwrap_or_else(|| {
        warn!(
            recorded = %manifest.params.identity_strategy,
            "unknown identity strategy in artifact; using id-then-name"
        );
        IdentityStrategy::IdThenName
    })
}

// floats may drift by an ulp through JSON, so only order and integer stats
fn same_ranking(left: &AggregateSummary, right: &AggregateSummary) -> bool {
    left.successful_points == right.successful_points
        && left.skipped_records == right.skipped_records
        && left.entities.len() == right.entities.len()
        && left.entities.iter().zip(&right.entities).all(|(a, b)| {
            a.entity_key == b.entity_key
                && a.total_appearances == b.total_appearances
                && a.best_rank == b.best_rank
                && a.worst_rank == b.worst_rank
                && a.top_3_count == b.top_3_count
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GridPoint, Listing, PointResult};

    fn results() -> Vec<PointResult> {
        let point = |index: usize| GridPoint {
            lat: 39.0,
            lng: -77.0 + index as f64 * 0.01,
            row: 0,
            col: index,
            index,
        };
        vec![
            PointResult::success(
                point(0),
                vec![Listing {
                    name: Some("Glow Spa".to_string()),
                    ..Listing::default()
                }],
            ),
            PointResult::success(
                point(1),
                vec![Listing {
                    place_id: Some("p1".to_string()),
                    ..Listing::default()
                }],
            ),
        ]
    }

    #[test]
    fn ranking_comparison_detects_strategy_changes() {
        let loose = aggregate(&results(), IdentityStrategy::IdThenName).expect("aggregate");
        let again = aggregate(&results(), IdentityStrategy::IdThenName).expect("aggregate");
        let strict = aggregate(&results(), IdentityStrategy::IdOnly).expect("aggregate");

        assert!(same_ranking(&loose, &again));
        assert!(!same_ranking(&loose, &strict));
    }

    #[test]
    fn explicit_strategy_wins_over_recorded_one() {
        let raw = serde_json::json!({
            "manifest_version": 1,
            "run_id": "scan-x",
            "generated_at": "2026-01-01T00:00:00Z",
            "params": {
                "search_term": "spa",
                "center": {"lat": 39.0, "lng": -77.0},
                "area": {"kind": "radius", "center": {"lat": 39.0, "lng": -77.0}, "radius_miles": 5.0},
                "grid_dimension": 1,
                "batch_size": 10,
                "point_timeout_ms": 1000,
                "inter_batch_delay_ms": 0,
                "deadline_secs": null,
                "max_results": 20,
                "identity_strategy": "id-only",
                "provider": "http"
            },
            "execution": {
                "started_at": "2026-01-01T00:00:00Z",
                "duration_ms": 10,
                "total_points": 0,
                "successful_points": 0,
                "failed_points": 0,
                "batches_run": 0,
                "deadline_hit": false
            },
            "point_results": [],
            "aggregate": {
                "successful_points": 0,
                "failed_points": 0,
                "total_unique_entities": 0,
                "skipped_records": 0,
                "name_fallback_count": 0,
                "coverage_distribution": {"90-100%": 0, "75-90%": 0, "50-75%": 0, "25-50%": 0, "<25%": 0},
                "entities": []
            }
        });
        let manifest: RunManifest = serde_json::from_value(raw).expect("manifest should parse");

        assert_eq!(resolve_strategy(None, &manifest), IdentityStrategy::IdOnly);
        assert_eq!(
            resolve_strategy(Some(IdentityStrategy::IdThenName), &manifest),
            IdentityStrategy::IdThenName
        );
    }
}
