use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::IdentityStrategy;

#[derive(Parser, Debug)]
#[command(
    name = "gridrank",
    version,
    about = "Geographic grid ranking scans for local business search"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Grid(GridArgs),
    Scan(ScanArgs),
    Rank(RankArgs),
    Heatmap(HeatmapArgs),
    Export(ExportArgs),
    Compare(CompareArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AreaArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub lng: Option<f64>,

    #[arg(long, default_value_t = 5.0)]
    pub radius_miles: f64,

    #[arg(
        long,
        allow_hyphen_values = true,
        value_delimiter = ',',
        conflicts_with_all = ["lat", "lng"]
    )]
    pub bounds: Option<Vec<f64>>,

    #[arg(long)]
    pub dimension: Option<usize>,

    #[arg(long, conflicts_with = "dimension")]
    pub target_points: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    #[command(flatten)]
    pub area: AreaArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProviderKind {
    Http,
    Replay,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum IdentityArg {
    IdThenName,
    IdOnly,
}

impl From<IdentityArg> for IdentityStrategy {
    fn from(value: IdentityArg) -> Self {
        match value {
            IdentityArg::IdThenName => Self::IdThenName,
            IdentityArg::IdOnly => Self::IdOnly,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(long, default_value = ".cache/gridrank")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub term: String,

    #[command(flatten)]
    pub area: AreaArgs,

    #[arg(long, value_enum, default_value_t = ProviderKind::Http)]
    pub provider: ProviderKind,

    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub replay_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 30_000)]
    pub point_timeout_ms: u64,

    #[arg(long, default_value_t = 2_000)]
    pub inter_batch_delay_ms: u64,

    #[arg(long)]
    pub deadline_secs: Option<u64>,

    #[arg(long, default_value_t = 20)]
    pub max_results: usize,

    #[arg(long, value_enum, default_value_t = IdentityArg::IdThenName)]
    pub identity: IdentityArg,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_store: bool,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RankArgs {
    #[arg(long)]
    pub artifact: PathBuf,

    #[arg(long, value_enum)]
    pub identity: Option<IdentityArg>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HeatmapArgs {
    #[arg(long)]
    pub artifact: PathBuf,

    #[arg(long)]
    pub business: Option<String>,

    #[arg(long, default_value_t = 3, conflicts_with = "business")]
    pub top: usize,

    #[arg(long, value_delimiter = ',', default_values_t = [3_usize, 10, 20])]
    pub tiers: Vec<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportKind {
    Competitors,
    Points,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[arg(long)]
    pub artifact: PathBuf,

    #[arg(long, value_enum, default_value_t = ExportKind::Competitors)]
    pub kind: ExportKind,

    #[arg(long)]
    pub business: Option<String>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long, default_value = ".cache/gridrank")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub first: String,

    #[arg(long)]
    pub second: String,

    #[arg(long)]
    pub term: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/gridrank")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
