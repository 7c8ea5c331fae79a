use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, warn};

use crate::model::{
    AggregateSummary, CoverageDistribution, EntityStats, IdentityStrategy, Listing, PointResult,
    RankObservation,
};

const TOP_3: usize = 3;
const TOP_10: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identity {
    External(String),
    NameFallback(String),
}

impl Identity {
    fn key(&self) -> &str {
        match self {
            Self::External(key) | Self::NameFallback(key) => key,
        }
    }
}

pub struct NameNormalizer {
    separators: Regex,
}

impl NameNormalizer {
    pub fn new() -> Result<Self> {
        let separators =
            Regex::new(r"[^\p{L}\p{N}]+").context("failed to compile name separator regex")?;
        Ok(Self { separators })
    }

    pub fn normalize(&self, name: &str) -> String {
        self.separators
            .replace_all(&name.to_lowercase(), " ")
            .trim()
            .to_string()
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

fn resolve_identity(
    listing: &Listing,
    strategy: IdentityStrategy,
    normalizer: &NameNormalizer,
) -> Option<Identity> {
    if let Some(place_id) = non_blank(listing.place_id.as_ref()) {
        return Some(Identity::External(format!("place:{place_id}")));
    }
    if let Some(cid) = non_blank(listing.cid.as_ref()) {
        return Some(Identity::External(format!("cid:{cid}")));
    }

    match strategy {
        IdentityStrategy::IdOnly => None,
        IdentityStrategy::IdThenName => non_blank(listing.name.as_ref())
            .map(|name| normalizer.normalize(name))
            .filter(|name| !name.is_empty())
            .map(|name| Identity::NameFallback(format!("name:{name}"))),
    }
}

struct EntityAccumulator {
    business: Listing,
    observations: Vec<RankObservation>,
}

impl EntityAccumulator {
    fn finish(self, entity_key: String, successful_points: usize) -> EntityStats {
        let mut ranks = self
            .observations
            .iter()
            .map(|observation| observation.rank)
            .collect::<Vec<usize>>();
        ranks.sort_unstable();

        let appearances = ranks.len();
        let rank_sum = ranks.iter().sum::<usize>();

        EntityStats {
            entity_key,
            business: self.business,
            total_appearances: appearances,
            coverage_percentage: appearances as f64 * 100.0 / successful_points as f64,
            average_rank: rank_sum as f64 / appearances as f64,
            median_rank: median(&ranks),
            best_rank: ranks[0],
            worst_rank: ranks[appearances - 1],
            first_place_count: ranks.iter().filter(|rank| **rank == 1).count(),
            top_3_count: ranks.iter().filter(|rank| **rank <= TOP_3).count(),
            top_10_count: ranks.iter().filter(|rank| **rank <= TOP_10).count(),
            observations: self.observations,
        }
    }
}

fn median(sorted: &[usize]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

pub fn aggregate(
    point_results: &[PointResult],
    strategy: IdentityStrategy,
) -> Result<AggregateSummary> {
    let normalizer = NameNormalizer::new()?;

    let mut ordered = point_results.iter().collect::<Vec<&PointResult>>();
    ordered.sort_by_key(|result| result.point.index);
    if let Some(pair) = ordered
        .windows(2)
        .find(|pair| pair[0].point.index == pair[1].point.index)
    {
        bail!("duplicate result for grid index {}", pair[0].point.index);
    }

    let successful_points = ordered.iter().filter(|result| result.is_success()).count();
    let failed_points = ordered.len() - successful_points;

    let mut accumulators = BTreeMap::<String, EntityAccumulator>::new();
    let mut skipped_records = 0usize;
    let mut name_fallback_count = 0usize;

    for result in ordered.iter().filter(|result| result.is_success()) {
        let point = result.point;
        let mut seen_at_point = HashSet::<String>::new();

        for (position, listing) in result.results.iter().enumerate() {
            let rank = position + 1;
            let Some(identity) = resolve_identity(listing, strategy, &normalizer) else {
                skipped_records += 1;
                debug!(grid_index = point.index, rank, "listing without identity skipped");
                continue;
            };

            if let Identity::NameFallback(key) = &identity {
                name_fallback_count += 1;
                debug!(grid_index = point.index, rank, key = %key, "identity fell back to name");
            }

            let key = identity.key().to_string();
            if !seen_at_point.insert(key.clone()) {
                continue;
            }

            accumulators
                .entry(key)
                .or_insert_with(|| EntityAccumulator {
                    business: listing.clone(),
                    observations: Vec::new(),
                })
                .observations
                .push(RankObservation {
                    index: point.index,
                    row: point.row,
                    col: point.col,
                    lat: point.lat,
                    lng: point.lng,
                    rank,
                });
        }
    }

    if name_fallback_count > 0 {
        warn!(
            name_fallback_count,
            "entities identified by normalized name; duplicates across spellings may remain"
        );
    }
    if skipped_records > 0 {
        warn!(skipped_records, "listings skipped for missing identity");
    }

    let mut entities = accumulators
        .into_iter()
        .map(|(key, accumulator)| accumulator.finish(key, successful_points))
        .collect::<Vec<EntityStats>>();
    sort_entities(&mut entities);

    Ok(AggregateSummary {
        successful_points,
        failed_points,
        total_unique_entities: entities.len(),
        skipped_records,
        name_fallback_count,
        coverage_distribution: coverage_distribution(&entities),
        entities,
    })
}

pub fn sort_entities(entities: &mut [EntityStats]) {
    entities.sort_by(|a, b| {
        b.total_appearances
            .cmp(&a.total_appearances)
            .then(a.average_rank.total_cmp(&b.average_rank))
            .then_with(|| a.entity_key.cmp(&b.entity_key))
    });
}

pub fn coverage_distribution(entities: &[EntityStats]) -> CoverageDistribution {
    let mut distribution = CoverageDistribution::default();
    for entity in entities {
        let coverage = entity.coverage_percentage;
        let band = if coverage >= 90.0 {
            &mut distribution.band_90_100
        } else if coverage >= 75.0 {
            &mut distribution.band_75_90
        } else if coverage >= 50.0 {
            &mut distribution.band_50_75
        } else if coverage >= 25.0 {
            &mut distribution.band_25_50
        } else {
            &mut distribution.below_25
        };
        *band += 1;
    }
    distribution
}
