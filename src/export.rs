use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};

use crate::model::{AggregateSummary, EntityStats, RunManifest};

const NOT_FOUND: &str = "Not Found";

const COMPETITOR_HEADERS: [&str; 12] = [
    "Rank",
    "Business Name",
    "Entity Key",
    "Coverage %",
    "Appearances",
    "Avg Rank",
    "Best Rank",
    "Worst Rank",
    "Rating",
    "Reviews",
    "Address",
    "Phone",
];

const POINT_HEADERS: [&str; 16] = [
    "Grid Index",
    "Grid Row",
    "Grid Col",
    "Latitude",
    "Longitude",
    "Status",
    "Target Rank",
    "Total Results",
    "Business Name",
    "Rank",
    "Rating",
    "Reviews",
    "Address",
    "Phone",
    "Coverage %",
    "Appearances",
];

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

pub fn write_competitors_csv<W: Write>(writer: W, summary: &AggregateSummary) -> Result<usize> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(COMPETITOR_HEADERS)
        .context("failed to write competitor csv header")?;

    for (position, stats) in summary.entities.iter().enumerate() {
        let business = &stats.business;
        csv.write_record([
            (position + 1).to_string(),
            stats.display_name().to_string(),
            stats.entity_key.clone(),
            format!("{:.2}", stats.coverage_percentage),
            stats.total_appearances.to_string(),
            format!("{:.2}", stats.average_rank),
            stats.best_rank.to_string(),
            stats.worst_rank.to_string(),
            optional(business.rating),
            optional(business.reviews),
            business.address.clone().unwrap_or_default(),
            business.phone.clone().unwrap_or_default(),
        ])
        .with_context(|| format!("failed to write competitor row {}", stats.entity_key))?;
    }

    csv.flush().context("failed to flush competitor csv")?;
    Ok(summary.entities.len())
}

// One row per listing returned at each point; failed points get a single row
// carrying their error. `Target Rank` is filled only when a target is given.
pub fn write_points_csv<W: Write>(
    writer: W,
    manifest: &RunManifest,
    target: Option<&EntityStats>,
) -> Result<usize> {
    let counted = manifest
        .aggregate
        .entities
        .iter()
        .flat_map(|stats| {
            stats
                .observations
                .iter()
                .map(move |observation| ((observation.index, observation.rank), stats))
        })
        .collect::<HashMap<(usize, usize), &EntityStats>>();
    let target_ranks = target
        .map(|stats| {
            stats
                .observations
                .iter()
                .map(|observation| (observation.index, observation.rank))
                .collect::<HashMap<usize, usize>>()
        })
        .unwrap_or_default();

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(POINT_HEADERS)
        .context("failed to write grid csv header")?;

    let mut ordered = manifest.point_results.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|result| result.point.index);

    let mut rows = 0usize;
    for result in ordered {
        let point = result.point;
        let location = [
            point.index.to_string(),
            point.row.to_string(),
            point.col.to_string(),
            point.lat.to_string(),
            point.lng.to_string(),
        ];
        let target_rank = match (target, target_ranks.get(&point.index)) {
            (None, _) => String::new(),
            (Some(_), Some(rank)) => rank.to_string(),
            (Some(_), None) if result.is_success() => NOT_FOUND.to_string(),
            (Some(_), None) => String::new(),
        };

        if let Some(error) = &result.error {
            let mut record = location.to_vec();
            record.extend([error.clone(), target_rank, "0".to_string()]);
            record.resize(POINT_HEADERS.len(), String::new());
            csv.write_record(&record)
                .with_context(|| format!("failed to write grid row {}", point.index))?;
            rows += 1;
            continue;
        }

        for (position, listing) in result.results.iter().enumerate() {
            let rank = position + 1;
            let stats = counted.get(&(point.index, rank));
            let mut record = location.to_vec();
            record.extend([
                "ok".to_string(),
                target_rank.clone(),
                result.results.len().to_string(),
                listing.name.clone().unwrap_or_default(),
                rank.to_string(),
                optional(listing.rating),
                optional(listing.reviews),
                listing.address.clone().unwrap_or_default(),
                listing.phone.clone().unwrap_or_default(),
                optional(stats.map(|stats| format!("{:.2}", stats.coverage_percentage))),
                optional(stats.map(|stats| stats.total_appearances)),
            ]);
            csv.write_record(&record)
                .with_context(|| format!("failed to write grid row {}", point.index))?;
            rows += 1;
        }
    }

    csv.flush().context("failed to flush grid csv")?;
    Ok(rows)
}
