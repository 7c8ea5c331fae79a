use std::fmt::Write as _;

use anyhow::{Result, bail};

use crate::model::{AggregateSummary, EntityStats, HeatCell, HeatMap, HeatMapStats};

const TIER_LABELS: [&str; 3] = ["best", "good", "fair"];
const WORST_TIER: &str = "poor";
pub const DEFAULT_TIER_THRESHOLDS: [usize; 3] = [3, 10, 20];

/// Ordered `(max_rank, tier)` thresholds; ranks past the last one are `poor`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeatMapPolicy {
    thresholds: Vec<(usize, &'static str)>,
}

impl Default for HeatMapPolicy {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_TIER_THRESHOLDS
                .into_iter()
                .zip(TIER_LABELS)
                .collect(),
        }
    }
}

impl HeatMapPolicy {
    pub fn from_thresholds(max_ranks: &[usize]) -> Result<Self> {
        if max_ranks.is_empty() || max_ranks.len() > TIER_LABELS.len() {
            bail!(
                "expected 1..={} tier thresholds, got {}",
                TIER_LABELS.len(),
                max_ranks.len()
            );
        }
        if max_ranks[0] == 0 {
            bail!("tier thresholds must be positive ranks");
        }
        if max_ranks.windows(2).any(|pair| pair[0] >= pair[1]) {
            bail!("tier thresholds must be strictly increasing: {max_ranks:?}");
        }

        Ok(Self {
            thresholds: max_ranks.iter().copied().zip(TIER_LABELS).collect(),
        })
    }

    pub fn tier_for(&self, rank: usize) -> &'static str {
        self.thresholds
            .iter()
            .find(|(max_rank, _)| rank <= *max_rank)
            .map(|(_, tier)| *tier)
            .unwrap_or(WORST_TIER)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeatMapSelection {
    Name(String),
    Top(usize),
}

pub fn select_entities<'a>(
    summary: &'a AggregateSummary,
    selection: &HeatMapSelection,
) -> Result<Vec<&'a EntityStats>> {
    match selection {
        HeatMapSelection::Name(query) => {
            let needle = query.trim().to_lowercase();
            if needle.is_empty() {
                bail!("entity name filter must not be empty");
            }
            let found = summary
                .entities
                .iter()
                .find(|stats| stats.display_name().to_lowercase().contains(&needle));
            match found {
                Some(stats) => Ok(vec![stats]),
                None => bail!("no entity name contains '{}'", query.trim()),
            }
        }
        HeatMapSelection::Top(count) => Ok(summary.entities.iter().take(*count).collect()),
    }
}

pub fn render(stats: &EntityStats, dimension: usize, policy: &HeatMapPolicy) -> Result<HeatMap> {
    let mut grid = vec![vec![None::<HeatCell>; dimension]; dimension];

    for observation in &stats.observations {
        if observation.row >= dimension || observation.col >= dimension {
            bail!(
                "observation at ({}, {}) lies outside a {dimension}x{dimension} grid",
                observation.row,
                observation.col
            );
        }
        grid[observation.row][observation.col] = Some(HeatCell {
            rank: observation.rank,
            tier: policy.tier_for(observation.rank).to_string(),
            lat: observation.lat,
            lng: observation.lng,
        });
    }

    let observed_cells = grid.iter().flatten().filter(|cell| cell.is_some()).count();
    let top_3_percentage = if stats.observations.is_empty() {
        0.0
    } else {
        stats.top_3_count as f64 * 100.0 / stats.observations.len() as f64
    };

    Ok(HeatMap {
        entity_key: stats.entity_key.clone(),
        business: stats.business.clone(),
        grid_dimension: dimension,
        stats: HeatMapStats {
            coverage_percentage: stats.coverage_percentage,
            average_rank: stats.average_rank,
            best_rank: stats.best_rank,
            worst_rank: stats.worst_rank,
            top_3_percentage,
            observed_cells,
        },
        grid,
    })
}

pub fn render_text(heat_map: &HeatMap) -> String {
    let name = heat_map
        .business
        .name
        .as_deref()
        .unwrap_or(&heat_map.entity_key);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{name}  coverage={:.1}% avg_rank={:.1} best={} worst={} top3={:.1}%",
        heat_map.stats.coverage_percentage,
        heat_map.stats.average_rank,
        heat_map.stats.best_rank,
        heat_map.stats.worst_rank,
        heat_map.stats.top_3_percentage,
    );

    for row in heat_map.grid.iter().rev() {
        let line = row
            .iter()
            .map(|cell| match cell {
                Some(cell) => format!("{:>3}", cell.rank),
                None => format!("{:>3}", "."),
            })
            .collect::<Vec<String>>()
            .join("");
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageDistribution, Listing, RankObservation};

    fn observation(row: usize, col: usize, rank: usize) -> RankObservation {
        RankObservation {
            index: row * 3 + col,
            row,
            col,
            lat: 39.0 + row as f64 * 0.01,
            lng: -77.0 + col as f64 * 0.01,
            rank,
        }
    }

    fn stats(name: &str, observations: Vec<RankObservation>) -> EntityStats {
        let ranks = observations.iter().map(|o| o.rank).collect::<Vec<_>>();
        EntityStats {
            entity_key: format!("name:{}", name.to_lowercase()),
            business: Listing {
                name: Some(name.to_string()),
                ..Listing::default()
            },
            total_appearances: observations.len(),
            coverage_percentage: observations.len() as f64 * 100.0 / 9.0,
            average_rank: ranks.iter().sum::<usize>() as f64 / ranks.len() as f64,
            median_rank: 0.0,
            best_rank: ranks.iter().copied().min().unwrap_or(0),
            worst_rank: ranks.iter().copied().max().unwrap_or(0),
            first_place_count: ranks.iter().filter(|rank| **rank == 1).count(),
            top_3_count: ranks.iter().filter(|rank| **rank <= 3).count(),
            top_10_count: ranks.iter().filter(|rank| **rank <= 10).count(),
            observations,
        }
    }

    fn summary(entities: Vec<EntityStats>) -> AggregateSummary {
        AggregateSummary {
            successful_points: 9,
            failed_points: 0,
            total_unique_entities: entities.len(),
            skipped_records: 0,
            name_fallback_count: 0,
            coverage_distribution: CoverageDistribution::default(),
            entities,
        }
    }

    #[test]
    fn default_policy_uses_fixed_thresholds() {
        let policy = HeatMapPolicy::default();
        assert_eq!(policy.tier_for(1), "best");
        assert_eq!(policy.tier_for(3), "best");
        assert_eq!(policy.tier_for(4), "good");
        assert_eq!(policy.tier_for(10), "good");
        assert_eq!(policy.tier_for(20), "fair");
        assert_eq!(policy.tier_for(21), "poor");
    }

    #[test]
    fn custom_thresholds_are_validated() {
        let policy = HeatMapPolicy::from_thresholds(&[1, 5]).expect("policy should build");
        assert_eq!(policy.tier_for(1), "best");
        assert_eq!(policy.tier_for(5), "good");
        assert_eq!(policy.tier_for(6), "poor");

        assert!(HeatMapPolicy::from_thresholds(&[]).is_err());
        assert!(HeatMapPolicy::from_thresholds(&[0, 3]).is_err());
        assert!(HeatMapPolicy::from_thresholds(&[10, 3]).is_err());
        assert!(HeatMapPolicy::from_thresholds(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn unobserved_cells_stay_empty() {
        let entity = stats(
            "Glow Spa",
            vec![observation(0, 0, 1), observation(1, 2, 25), observation(2, 1, 7)],
        );

        let heat_map =
            render(&entity, 3, &HeatMapPolicy::default()).expect("heat map should render");
        assert_eq!(heat_map.grid.len(), 3);
        assert!(heat_map.grid.iter().all(|row| row.len() == 3));
        assert_eq!(heat_map.stats.observed_cells, 3);

        let worst = heat_map.grid[1][2].as_ref().expect("observed cell");
        assert_eq!(worst.tier, "poor");
        assert_eq!(worst.rank, 25);
        assert!(heat_map.grid[1][1].is_none());
        assert_eq!(heat_map.grid[0][0].as_ref().map(|cell| cell.tier.as_str()), Some("best"));
        assert!((heat_map.stats.top_3_percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn observations_outside_the_grid_are_rejected() {
        let entity = stats("Glow Spa", vec![observation(4, 0, 1)]);
        let error = render(&entity, 3, &HeatMapPolicy::default())
            .expect_err("out-of-grid observation should fail");
        assert!(error.to_string().contains("outside"), "{error}");
    }

    #[test]
    fn selection_by_name_or_top_n() {
        let summary = summary(vec![
            stats("Alpha Aesthetics", vec![observation(0, 0, 1)]),
            stats("The Fix Clinic", vec![observation(0, 1, 2)]),
            stats("Fix Med Spa", vec![observation(0, 2, 3)]),
        ]);

        let found = select_entities(&summary, &HeatMapSelection::Name("fix".to_string()))
            .expect("name should match");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_name(), "The Fix Clinic");

        let top = select_entities(&summary, &HeatMapSelection::Top(2)).expect("top should select");
        assert_eq!(top.len(), 2);

        let error = select_entities(&summary, &HeatMapSelection::Name("zen".to_string()))
            .expect_err("missing name should fail");
        assert!(error.to_string().contains("zen"), "{error}");
    }

    #[test]
    fn text_view_prints_north_first() {
        let entity = stats("Glow Spa", vec![observation(0, 0, 1), observation(2, 2, 12)]);
        let heat_map =
            render(&entity, 3, &HeatMapPolicy::default()).expect("heat map should render");

        let text = render_text(&heat_map);
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("Glow Spa"));
        assert_eq!(lines[1], "  .  . 12");
        assert_eq!(lines[2], "  .  .  .");
        assert_eq!(lines[3], "  1  .  .");
    }
}
