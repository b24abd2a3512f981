use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

const SEARCH_FIELDS: &str = "place_id,name,formatted_address,rating,user_ratings_total";
const DETAIL_FIELDS: &str = "url,rating";
const PROBE_QUERY: &str = "Google Headquarters";

/// Identity fields of one business, as handed to the strategy chain.
#[derive(Debug, Clone, Copy)]
pub struct LookupQuery<'a> {
    pub name: &'a str,
    pub address: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    FullAddress,
    NameWithLocality,
    ShortNameWithStreet,
    NameOnly,
    AddressOnly,
}

impl LookupStrategy {
    /// Tried in order, most specific first.
    pub const CHAIN: [LookupStrategy; 5] = [
        LookupStrategy::FullAddress,
        LookupStrategy::NameWithLocality,
        LookupStrategy::ShortNameWithStreet,
        LookupStrategy::NameOnly,
        LookupStrategy::AddressOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStrategy::FullAddress => "full_address",
            LookupStrategy::NameWithLocality => "name_with_locality",
            LookupStrategy::ShortNameWithStreet => "short_name_with_street",
            LookupStrategy::NameOnly => "name_only",
            LookupStrategy::AddressOnly => "address_only",
        }
    }

    /// `None` when the inputs this strategy needs are absent.
    pub fn build_query(&self, query: &LookupQuery<'_>) -> Option<String> {
        let name = collapse_whitespace(query.name);
        let address = collapse_whitespace(query.address);
        let built = match self {
            LookupStrategy::FullAddress => join_pair(&name, &address),
            LookupStrategy::NameWithLocality => {
                let (_, locality) = split_street(&address)?;
                join_pair(&name, locality)
            }
            LookupStrategy::ShortNameWithStreet => {
                let (street, _) = split_street(&address)?;
                let short_name = name.split(' ').take(2).collect::<Vec<_>>().join(" ");
                join_pair(&short_name, street)
            }
            LookupStrategy::NameOnly => Some(name.clone()),
            LookupStrategy::AddressOnly => Some(address.clone()),
        }?;
        Some(built).filter(|value| !value.is_empty())
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Both parts must be present for a combined query.
fn join_pair(first: &str, second: &str) -> Option<String> {
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some(format!("{first} {second}"))
}

/// Splits "123 Main St, Anytown, CA" into ("123 Main St", "Anytown, CA").
fn split_street(address: &str) -> Option<(&str, &str)> {
    let (street, rest) = address.split_once(',')?;
    let street = street.trim();
    let rest = rest.trim().trim_matches(',').trim();
    if street.is_empty() || rest.is_empty() {
        return None;
    }
    Some((street, rest))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub place_id: String,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub rating: Option<f64>,
    pub maps_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceListing {
    pub maps_url: String,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceMatch {
    pub maps_url: String,
    pub review_score: Option<f64>,
    pub strategy: LookupStrategy,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(PlaceMatch),
    NotFound,
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Candidates in the service's own relevance order; empty means no match.
    async fn search(&self, query: &str) -> AppResult<Vec<PlaceCandidate>>;

    /// Canonical listing for a candidate that came back without a URL.
    async fn listing(&self, place_id: &str) -> AppResult<Option<PlaceListing>>;
}

#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<dyn PlaceLookup>,
}

impl PlacesService {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let client = HttpPlacesClient::new(config, api_key)?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    pub fn from_lookup(lookup: Arc<dyn PlaceLookup>) -> Self {
        Self { inner: lookup }
    }

    /// Walks the strategy chain and stops at the first query with a candidate.
    ///
    /// Exhausting every strategy is `NotFound`, not an error. Service errors end
    /// the chain immediately; an identical query is never sent twice.
    pub async fn resolve(&self, query: &LookupQuery<'_>) -> AppResult<LookupOutcome> {
        let mut attempted: Vec<String> = Vec::with_capacity(LookupStrategy::CHAIN.len());
        for strategy in LookupStrategy::CHAIN {
            let Some(text) = strategy.build_query(query) else {
                trace!(strategy = strategy.as_str(), "strategy not applicable");
                continue;
            };
            if attempted.iter().any(|previous| previous == &text) {
                trace!(strategy = strategy.as_str(), "skipping repeated query");
                continue;
            }

            let candidates = self.inner.search(&text).await?;
            attempted.push(text.clone());
            let Some(first) = candidates.into_iter().next() else {
                debug!(strategy = strategy.as_str(), query = %text, "no candidates");
                continue;
            };

            let listing = match first.maps_url.clone() {
                Some(url) if !url.trim().is_empty() => Some(PlaceListing {
                    maps_url: url,
                    rating: first.rating,
                }),
                _ => self.inner.listing(&first.place_id).await?,
            };
            let Some(listing) = listing else {
                debug!(
                    strategy = strategy.as_str(),
                    place_id = %first.place_id,
                    "candidate has no listing url"
                );
                continue;
            };

            debug!(
                strategy = strategy.as_str(),
                query = %text,
                candidate = first.name.as_deref().unwrap_or_default(),
                address = first.formatted_address.as_deref().unwrap_or_default(),
                maps_url = %listing.maps_url,
                "resolved place"
            );
            return Ok(LookupOutcome::Found(PlaceMatch {
                maps_url: listing.maps_url,
                review_score: first.rating.or(listing.rating),
                strategy,
                query: text,
            }));
        }

        debug!(
            name = query.name,
            attempts = attempted.len(),
            "no place found for any strategy"
        );
        Ok(LookupOutcome::NotFound)
    }

    /// Issues one search to confirm the key is accepted.
    pub async fn probe(&self) -> AppResult<usize> {
        Ok(self.inner.search(PROBE_QUERY).await?.len())
    }
}

struct HttpPlacesClient {
    http: reqwest::Client,
    api_key: SecretString,
    api_base: String,
}

impl HttpPlacesClient {
    fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            api_key,
            api_base: config.places_api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    candidates: Vec<SearchCandidate>,
}

#[derive(Deserialize)]
struct SearchCandidate {
    place_id: Option<String>,
    name: Option<String>,
    formatted_address: Option<String>,
    rating: Option<f64>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    result: Option<DetailsResult>,
}

#[derive(Deserialize)]
struct DetailsResult {
    url: Option<String>,
    rating: Option<f64>,
}

fn status_error(status: String, message: Option<String>) -> AppError {
    AppError::Places {
        status,
        message: message.unwrap_or_else(|| "no error message".into()),
    }
}

#[async_trait]
impl PlaceLookup for HttpPlacesClient {
    async fn search(&self, query: &str) -> AppResult<Vec<PlaceCandidate>> {
        let response: SearchResponse = self
            .http
            .get(format!("{}/findplacefromtext/json", self.api_base))
            .query(&[
                ("input", query),
                ("inputtype", "textquery"),
                ("fields", SEARCH_FIELDS),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response
                .candidates
                .into_iter()
                .filter_map(|candidate| {
                    Some(PlaceCandidate {
                        place_id: candidate.place_id?,
                        name: candidate.name,
                        formatted_address: candidate.formatted_address,
                        rating: candidate.rating,
                        maps_url: None,
                    })
                })
                .collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            _ => Err(status_error(response.status, response.error_message)),
        }
    }

    async fn listing(&self, place_id: &str) -> AppResult<Option<PlaceListing>> {
        let response: DetailsResponse = self
            .http
            .get(format!("{}/details/json", self.api_base))
            .query(&[
                ("place_id", place_id),
                ("fields", DETAIL_FIELDS),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response.result.and_then(|result| {
                let url = result.url.filter(|url| !url.trim().is_empty())?;
                Some(PlaceListing {
                    maps_url: url,
                    rating: result.rating,
                })
            })),
            "NOT_FOUND" | "ZERO_RESULTS" => Ok(None),
            _ => Err(status_error(response.status, response.error_message)),
        }
    }
}
