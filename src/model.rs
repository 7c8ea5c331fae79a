use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub southwest: Coordinate,
    pub northeast: Coordinate,
}

impl Bounds {
    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: (self.southwest.lat + self.northeast.lat) / 2.0,
            lng: (self.southwest.lng + self.northeast.lng) / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub lat: f64,
    pub lng: f64,
    pub row: usize,
    pub col: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    pub point: GridPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<Listing>,
}

impl PointResult {
    pub fn success(point: GridPoint, results: Vec<Listing>) -> Self {
        Self {
            point,
            error: None,
            results,
        }
    }

    pub fn failure(point: GridPoint, error: impl Into<String>) -> Self {
        Self {
            point,
            error: Some(error.into()),
            results: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IdentityStrategy {
    IdThenName,
    IdOnly,
}

impl IdentityStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdThenName => "id-then-name",
            Self::IdOnly => "id-only",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "id-then-name" => Some(Self::IdThenName),
            "id-only" => Some(Self::IdOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankObservation {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub lat: f64,
    pub lng: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub entity_key: String,
    pub business: Listing,
    pub total_appearances: usize,
    pub coverage_percentage: f64,
    pub average_rank: f64,
    pub median_rank: f64,
    pub best_rank: usize,
    pub worst_rank: usize,
    pub first_place_count: usize,
    pub top_3_count: usize,
    pub top_10_count: usize,
    pub observations: Vec<RankObservation>,
}

impl EntityStats {
    pub fn display_name(&self) -> &str {
        self.business.name.as_deref().unwrap_or(&self.entity_key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageDistribution {
    #[serde(rename = "90-100%")]
    pub band_90_100: usize,
    #[serde(rename = "75-90%")]
    pub band_75_90: usize,
    #[serde(rename = "50-75%")]
    pub band_50_75: usize,
    #[serde(rename = "25-50%")]
    pub band_25_50: usize,
    #[serde(rename = "<25%")]
    pub below_25: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub successful_points: usize,
    pub failed_points: usize,
    pub total_unique_entities: usize,
    pub skipped_records: usize,
    pub name_fallback_count: usize,
    pub coverage_distribution: CoverageDistribution,
    pub entities: Vec<EntityStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchArea {
    Radius { center: Coordinate, radius_miles: f64 },
    Bounds { bounds: Bounds },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub search_term: String,
    pub center: Coordinate,
    pub area: SearchArea,
    pub grid_dimension: usize,
    pub batch_size: usize,
    pub point_timeout_ms: u64,
    pub inter_batch_delay_ms: u64,
    pub deadline_secs: Option<u64>,
    pub max_results: usize,
    pub identity_strategy: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunExecution {
    pub started_at: String,
    pub duration_ms: u128,
    pub total_points: usize,
    pub successful_points: usize,
    pub failed_points: usize,
    pub batches_run: usize,
    pub deadline_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub params: RunParams,
    pub execution: RunExecution,
    pub point_results: Vec<PointResult>,
    pub aggregate: AggregateSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub rank: usize,
    pub tier: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapStats {
    pub coverage_percentage: f64,
    pub average_rank: f64,
    pub best_rank: usize,
    pub worst_rank: usize,
    pub top_3_percentage: f64,
    pub observed_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMap {
    pub entity_key: String,
    pub business: Listing,
    pub grid_dimension: usize,
    pub stats: HeatMapStats,
    pub grid: Vec<Vec<Option<HeatCell>>>,
}
