use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

use crate::model::{AggregateSummary, CoverageDistribution};
use crate::util::write_json_stdout;

#[derive(Debug, Serialize)]
struct RankingRow<'a> {
    position: usize,
    name: &'a str,
    entity_key: &'a str,
    appearances: usize,
    coverage_percentage: f64,
    average_rank: f64,
    best_rank: usize,
    worst_rank: usize,
    top_3_count: usize,
    top_10_count: usize,
    rating: Option<f64>,
    reviews: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RankingReport<'a> {
    run_id: &'a str,
    search_term: &'a str,
    grid_dimension: usize,
    successful_points: usize,
    failed_points: usize,
    total_unique_entities: usize,
    skipped_records: usize,
    name_fallback_count: usize,
    coverage_distribution: &'a CoverageDistribution,
    returned: usize,
    entities: Vec<RankingRow<'a>>,
}

pub(crate) struct RankingHeader<'a> {
    pub(crate) run_id: &'a str,
    pub(crate) search_term: &'a str,
    pub(crate) grid_dimension: usize,
}

pub(crate) fn write_ranking(
    header: &RankingHeader<'_>,
    summary: &AggregateSummary,
    limit: usize,
    json: bool,
) -> Result<()> {
    let rows = summary
        .entities
        .iter()
        .take(limit)
        .enumerate()
        .map(|(position, stats)| RankingRow {
            position: position + 1,
            name: stats.display_name(),
            entity_key: &stats.entity_key,
            appearances: stats.total_appearances,
            coverage_percentage: stats.coverage_percentage,
            average_rank: stats.average_rank,
            best_rank: stats.best_rank,
            worst_rank: stats.worst_rank,
            top_3_count: stats.top_3_count,
            top_10_count: stats.top_10_count,
            rating: stats.business.rating,
            reviews: stats.business.reviews,
        })
        .collect::<Vec<RankingRow<'_>>>();

    if json {
        return write_json_stdout(&RankingReport {
            run_id: header.run_id,
            search_term: header.search_term,
            grid_dimension: header.grid_dimension,
            successful_points: summary.successful_points,
            failed_points: summary.failed_points,
            total_unique_entities: summary.total_unique_entities,
            skipped_records: summary.skipped_records,
            name_fallback_count: summary.name_fallback_count,
            coverage_distribution: &summary.coverage_distribution,
            returned: rows.len(),
            entities: rows,
        });
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "Run: {}  term=\"{}\"  grid={}x{}",
        header.run_id, header.search_term, header.grid_dimension, header.grid_dimension
    )?;
    writeln!(
        output,
        "Points: successful={} failed={}  entities={} skipped_records={} name_fallbacks={}",
        summary.successful_points,
        summary.failed_points,
        summary.total_unique_entities,
        summary.skipped_records,
        summary.name_fallback_count,
    )?;
    let bands = &summary.coverage_distribution;
    writeln!(
        output,
        "Coverage: 90-100%={} 75-90%={} 50-75%={} 25-50%={} <25%={}",
        bands.band_90_100, bands.band_75_90, bands.band_50_75, bands.band_25_50, bands.below_25
    )?;

    for row in &rows {
        writeln!(
            output,
            "{}.\t{}\tcoverage={:.1}% ({})\tavg=#{:.2}\tbest=#{} worst=#{}\ttop3={} top10={}",
            row.position,
            row.name,
            row.coverage_percentage,
            row.appearances,
            row.average_rank,
            row.best_rank,
            row.worst_rank,
            row.top_3_count,
            row.top_10_count,
        )?;
    }
    output.flush()?;
    Ok(())
}
