use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;

use super::SearchProvider;
use crate::model::{GridPoint, Listing};

pub struct HttpSearch {
    client: Client,
    endpoint: String,
    max_results: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Listings(Vec<Listing>),
    Wrapped { results: Vec<Listing> },
}

impl SearchResponse {
    fn into_listings(self) -> Vec<Listing> {
        match self {
            Self::Listings(listings) => listings,
            Self::Wrapped { results } => results,
        }
    }
}

impl HttpSearch {
    pub fn new(endpoint: &str, max_results: usize) -> Result<Self> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            bail!("search endpoint must not be empty");
        }

        let client = Client::builder()
            .user_agent(concat!("gridrank/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            max_results: max_results.max(1),
        })
    }
}

impl SearchProvider for HttpSearch {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn search(&self, term: &str, point: &GridPoint) -> Result<Vec<Listing>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", term.to_string()),
                ("lat", point.lat.to_string()),
                ("lng", point.lng.to_string()),
                ("limit", self.max_results.to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("search request failed at grid index {}", point.index))?;

        let status = response.status();
        if !status.is_success() {
            bail!("search endpoint returned {status} at grid index {}", point.index);
        }

        let body: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("invalid search payload at grid index {}", point.index))?;

        let mut listings = body.into_listings();
        listings.truncate(self.max_results);
        Ok(listings)
    }
}
