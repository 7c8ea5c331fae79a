mod http;
mod replay;

use anyhow::Result;

use crate::model::{GridPoint, Listing};

pub use http::HttpSearch;
pub use replay::ReplaySearch;

pub trait SearchProvider {
    fn name(&self) -> &'static str;

    async fn search(&self, term: &str, point: &GridPoint) -> Result<Vec<Listing>>;
}

pub enum Provider {
    Http(HttpSearch),
    Replay(ReplaySearch),
}

impl SearchProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Self::Http(inner) => inner.name(),
            Self::Replay(inner) => inner.name(),
        }
    }

    async fn search(&self, term: &str, point: &GridPoint) -> Result<Vec<Listing>> {
        match self {
            Self::Http(inner) => inner.search(term, point).await,
            Self::Replay(inner) => inner.search(term, point).await,
        }
    }
}
