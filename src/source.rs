//! External source abstraction and the shared enrichment loop.
//!
//! The two knowledge bases — the Getty vocabulary and Wikidata — share
//! one skeleton: build a source-specific query for a candidate, execute
//! it against a SPARQL endpoint, and map the first result binding onto
//! the candidate's still-empty fields. [`ExternalSource`] captures that
//! skeleton; [`enrich`] implements the retry policy once for all
//! sources, so rate-limit handling never gets duplicated per variant.
//!
//! Rate limiting is an explicit result, not an error path: the first
//! 429 for a candidate marks it, sleeps a fixed cooldown, and repeats
//! the same query exactly once. A second 429 reports
//! [`EnrichOutcome::RateLimitExhausted`] so the caller can stop the
//! batch instead of hammering the service. Any other failure is logged
//! and leaves the candidate unresolved for that source only.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;

use crate::models::Candidate;

/// One result row, flattened from the SPARQL JSON shape
/// `{ results: { bindings: [ { field: { value: ... } } ] } }`.
pub type Binding = BTreeMap<String, String>;

/// Result of one query execution against a source.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The source answered; an empty vector means "no match", not an error.
    Bindings(Vec<Binding>),
    /// The source signalled throttling (HTTP 429 class).
    RateLimited,
    /// Transport or decode failure; non-fatal for the batch.
    Failed(anyhow::Error),
}

/// How a non-success status should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Other,
}

/// Result of enriching one candidate from one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// At least one binding came back and was mapped.
    Matched,
    /// The query ran but nothing matched.
    NoMatch,
    /// The query failed for this candidate only; the batch continues.
    Skipped,
    /// Throttled twice for the same candidate; the batch must stop.
    RateLimitExhausted,
}

/// A read-only external knowledge base queried once per candidate.
///
/// Implementations supply the query template and the field mapping;
/// execution and retry live in [`enrich`]. Query construction is
/// textual template substitution, including the activation of the
/// commented-out live-span filter block when the candidate has a
/// timeline.
#[async_trait]
pub trait ExternalSource: Send + Sync {
    /// Display name used in progress and failure reporting.
    fn name(&self) -> &str;

    /// SPARQL endpoint this source queries.
    fn endpoint(&self) -> &str;

    /// Substitute the candidate's canonical name (and, when present,
    /// its live-span bounds) into the source's query template.
    fn build_query(&self, candidate: &Candidate) -> String;

    /// Map the first result binding onto the candidate. Must only fill
    /// empty fields, except for the source's own reference field.
    fn map_result(&self, binding: &Binding, candidate: &mut Candidate);

    /// Classify a non-success status for the retry decision.
    fn classify_failure(&self, status: StatusCode) -> FailureKind {
        if status == StatusCode::TOO_MANY_REQUESTS {
            FailureKind::RateLimited
        } else {
            FailureKind::Other
        }
    }

    /// Execute one query. The default implementation issues the request
    /// against [`endpoint`](ExternalSource::endpoint) and classifies the
    /// response; tests override this with scripted outcomes.
    async fn execute(&self, http: &reqwest::Client, query: &str) -> QueryOutcome {
        let response = http
            .get(self.endpoint())
            .query(&[("query", query), ("format", "json")])
            .header(ACCEPT, "application/sparql-results+json")
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(e) => return QueryOutcome::Failed(e.into()),
        };
        let status = response.status();
        if status.is_success() {
            match response.json::<serde_json::Value>().await {
                Ok(value) => QueryOutcome::Bindings(flatten_bindings(&value)),
                Err(e) => QueryOutcome::Failed(e.into()),
            }
        } else {
            match self.classify_failure(status) {
                FailureKind::RateLimited => QueryOutcome::RateLimited,
                FailureKind::Other => QueryOutcome::Failed(anyhow!(
                    "{} returned status {status}",
                    self.name()
                )),
            }
        }
    }
}

/// Flatten a SPARQL JSON result document into per-row field/value maps.
pub fn flatten_bindings(value: &serde_json::Value) -> Vec<Binding> {
    let Some(rows) = value["results"]["bindings"].as_array() else {
        return Vec::new();
    };
    rows.iter()
        .map(|row| {
            let mut binding = Binding::new();
            if let Some(fields) = row.as_object() {
                for (field, cell) in fields {
                    if let Some(text) = cell["value"].as_str() {
                        binding.insert(field.clone(), text.to_string());
                    }
                }
            }
            binding
        })
        .collect()
}

/// Query one source for one candidate, applying the bounded rate-limit
/// retry, and merge the answer into the candidate's empty fields.
pub async fn enrich(
    source: &dyn ExternalSource,
    http: &reqwest::Client,
    candidate: &mut Candidate,
    cooldown: Duration,
) -> EnrichOutcome {
    let query = source.build_query(candidate);
    loop {
        match source.execute(http, &query).await {
            QueryOutcome::Bindings(bindings) => match bindings.first() {
                Some(binding) => {
                    source.map_result(binding, candidate);
                    return EnrichOutcome::Matched;
                }
                None => return EnrichOutcome::NoMatch,
            },
            QueryOutcome::RateLimited => {
                if candidate.query_failed {
                    return EnrichOutcome::RateLimitExhausted;
                }
                candidate.query_failed = true;
                println!(
                    "{} rate limited for {}, retrying in {}s ...",
                    source.name(),
                    candidate.name(),
                    cooldown.as_secs()
                );
                tokio::time::sleep(cooldown).await;
            }
            QueryOutcome::Failed(e) => {
                eprintln!("{} failed for {}: {e:#}", source.name(), candidate.name());
                return EnrichOutcome::Skipped;
            }
        }
    }
}
