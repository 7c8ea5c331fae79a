use std::collections::HashMap;
use std::path::Path;

use anyhow::{Result, anyhow, bail};

use super::SearchProvider;
use crate::model::{GridPoint, Listing, PointResult, RunManifest};
use crate::util::read_json;

const POSITION_TOLERANCE_DEG: f64 = 1e-6;

pub struct ReplaySearch {
    recorded: HashMap<usize, PointResult>,
}

impl ReplaySearch {
    pub fn from_manifest_path(path: &Path) -> Result<Self> {
        let manifest: RunManifest = read_json(path)?;
        Ok(Self::from_point_results(manifest.point_results))
    }

    pub fn from_point_results(point_results: Vec<PointResult>) -> Self {
        let recorded = point_results
            .into_iter()
            .map(|result| (result.point.index, result))
            .collect();
        Self { recorded }
    }

    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }
}

impl SearchProvider for ReplaySearch {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn search(&self, _term: &str, point: &GridPoint) -> Result<Vec<Listing>> {
        let recorded = self
            .recorded
            .get(&point.index)
            .ok_or_else(|| anyhow!("no recorded result for grid index {}", point.index))?;

        let drift_lat = (recorded.point.lat - point.lat).abs();
        let drift_lng = (recorded.point.lng - point.lng).abs();
        if drift_lat > POSITION_TOLERANCE_DEG || drift_lng > POSITION_TOLERANCE_DEG {
            bail!(
                "recorded grid index {} was sampled at ({}, {}), not ({}, {})",
                point.index,
                recorded.point.lat,
                recorded.point.lng,
                point.lat,
                point.lng
            );
        }

        if let Some(error) = &recorded.error {
            bail!("recorded failure: {error}");
        }

        Ok(recorded.results.clone())
    }
}
