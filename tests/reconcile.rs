//! Batch reconciliation tests with a scripted registry and scripted
//! external sources; no network involved.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use artist_reconciler::authority::RegistryLookup;
use artist_reconciler::engine::{collect_candidates, reconcile, InputRecord};
use artist_reconciler::models::{Candidate, Field};
use artist_reconciler::source::{Binding, ExternalSource, QueryOutcome};

struct MockRegistry {
    ids: HashMap<String, String>,
    calls: usize,
}

impl MockRegistry {
    fn empty() -> Self {
        Self {
            ids: HashMap::new(),
            calls: 0,
        }
    }

    fn with(name: &str, id: &str) -> Self {
        let mut registry = Self::empty();
        registry.ids.insert(name.to_string(), id.to_string());
        registry
    }
}

#[async_trait]
impl RegistryLookup for MockRegistry {
    async fn find_local_id(&mut self, name: &str) -> Result<Option<String>> {
        self.calls += 1;
        Ok(self.ids.get(name).cloned())
    }
}

/// A source that replays scripted outcomes instead of hitting an
/// endpoint. Binding keys map straight onto candidate fields.
struct ScriptedSource {
    name: &'static str,
    outcomes: Mutex<VecDeque<QueryOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(name: &'static str, outcomes: Vec<QueryOutcome>) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Local newtype so the foreign `ExternalSource` trait can be
/// implemented for a shared handle without tripping the orphan rule.
struct SharedSource(Arc<ScriptedSource>);

impl std::ops::Deref for SharedSource {
    type Target = ScriptedSource;

    fn deref(&self) -> &ScriptedSource {
        &self.0
    }
}

#[async_trait]
impl ExternalSource for SharedSource {
    fn name(&self) -> &str {
        self.0.name
    }

    fn endpoint(&self) -> &str {
        "scripted:"
    }

    fn build_query(&self, candidate: &Candidate) -> String {
        format!("{} #{}", self.0.name, candidate.name())
    }

    fn map_result(&self, binding: &Binding, candidate: &mut Candidate) {
        if let Some(reference) = binding.get("ref") {
            candidate.set(Field::Ulan, reference);
        }
        for (key, field) in [
            ("surname", Field::Surname),
            ("forename", Field::Forename),
            ("gender", Field::Gender),
            ("birth", Field::Birth),
            ("death", Field::Death),
        ] {
            if let Some(value) = binding.get(key) {
                candidate.set_if_empty(field, value);
            }
        }
    }

    async fn execute(&self, _http: &reqwest::Client, _query: &str) -> QueryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(QueryOutcome::Bindings(Vec::new()))
    }
}

fn binding(pairs: &[(&str, &str)]) -> Vec<Binding> {
    vec![pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()]
}

fn http() -> reqwest::Client {
    reqwest::Client::new()
}

fn records(rows: &[(&str, &str)]) -> Vec<InputRecord> {
    rows.iter()
        .map(|(name, date)| InputRecord {
            name: name.to_string(),
            dates: vec![date.to_string()],
        })
        .collect()
}

fn boxed(source: &Arc<ScriptedSource>) -> Box<dyn ExternalSource> {
    Box::new(SharedSource(Arc::clone(source)))
}

const COOLDOWN: Duration = Duration::from_millis(10);

#[tokio::test]
async fn empty_sources_leave_candidate_unresolved() {
    let candidates = collect_candidates(&records(&[("Jane Doe", "1923-1939")]), "unbekannt");
    let mut registry = MockRegistry::empty();
    let getty = ScriptedSource::new("Getty", vec![]);
    let wikidata = ScriptedSource::new("Wikidata", vec![]);
    let sources = vec![boxed(&getty), boxed(&wikidata)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert!(report.existing.is_empty());
    assert!(report.resolved.is_empty());
    assert!(report.aborted_at.is_none());
    assert_eq!(report.unresolved.len(), 1);
    let jane = &report.unresolved[0];
    assert_eq!(jane.name(), "Jane Doe");
    assert_eq!(jane.dates, vec!["1923", "1939"]);
    assert_eq!(jane.get(Field::LivedBefore), "1923");
    assert_eq!(jane.get(Field::LivedAfter), "1939");
}

#[tokio::test]
async fn existing_records_skip_external_sources() {
    let candidates = collect_candidates(&records(&[("Jane Doe", "1908")]), "unbekannt");
    let mut registry = MockRegistry::with("Jane Doe", "4711");
    let getty = ScriptedSource::new("Getty", vec![]);
    let sources = vec![boxed(&getty)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert_eq!(report.existing.len(), 1);
    assert_eq!(report.existing[0].local_id(), Some("4711"));
    assert!(report.resolved.is_empty());
    assert_eq!(getty.calls(), 0);
}

#[tokio::test]
async fn later_sources_fill_gaps_but_never_overwrite() {
    let candidates = collect_candidates(&records(&[("Jane Doe", "1908")]), "unbekannt");
    let mut registry = MockRegistry::empty();
    let getty = ScriptedSource::new(
        "Getty",
        vec![QueryOutcome::Bindings(binding(&[
            ("surname", "Doe"),
            ("forename", "Jane"),
        ]))],
    );
    let wikidata = ScriptedSource::new(
        "Wikidata",
        vec![QueryOutcome::Bindings(binding(&[
            ("surname", "Roe"),
            ("gender", "weiblich"),
        ]))],
    );
    let sources = vec![boxed(&getty), boxed(&wikidata)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert_eq!(report.resolved.len(), 1);
    let jane = &report.resolved[0];
    assert_eq!(jane.get(Field::Surname), "Doe");
    assert_eq!(jane.get(Field::Forename), "Jane");
    assert_eq!(jane.get(Field::Gender), "weiblich");
}

#[tokio::test]
async fn one_rate_limit_is_retried_once() {
    let candidates = collect_candidates(&records(&[("Jane Doe", "1908")]), "unbekannt");
    let mut registry = MockRegistry::empty();
    let getty = ScriptedSource::new(
        "Getty",
        vec![
            QueryOutcome::RateLimited,
            QueryOutcome::Bindings(binding(&[("surname", "Doe")])),
        ],
    );
    let sources = vec![boxed(&getty)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert_eq!(getty.calls(), 2);
    assert_eq!(report.resolved.len(), 1);
    let jane = &report.resolved[0];
    assert_eq!(jane.get(Field::Surname), "Doe");
    assert!(jane.query_failed);
}

#[tokio::test]
async fn second_rate_limit_aborts_the_batch() {
    let candidates = collect_candidates(
        &records(&[("Aaron", "1900"), ("Alpha", "1908"), ("Beta", "1920")]),
        "unbekannt",
    );
    let mut registry = MockRegistry::with("Aaron", "1234");
    let getty = ScriptedSource::new(
        "Getty",
        vec![QueryOutcome::RateLimited, QueryOutcome::RateLimited],
    );
    let wikidata = ScriptedSource::new("Wikidata", vec![]);
    let sources = vec![boxed(&getty), boxed(&wikidata)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert_eq!(report.aborted_at.as_deref(), Some("Alpha"));
    // Exactly two calls: the original query and its single retry.
    assert_eq!(getty.calls(), 2);
    // The batch stopped: no later source, no candidate after Alpha.
    assert_eq!(wikidata.calls(), 0);
    assert_eq!(registry.calls, 2);
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.unresolved[0].name(), "Alpha");
    // The candidate resolved before the abort keeps its registry hit.
    assert_eq!(report.existing.len(), 1);
    assert_eq!(report.existing[0].local_id(), Some("1234"));
}

#[tokio::test]
async fn transport_failures_skip_the_source_only() {
    let candidates = collect_candidates(&records(&[("Jane Doe", "1908")]), "unbekannt");
    let mut registry = MockRegistry::empty();
    let getty = ScriptedSource::new(
        "Getty",
        vec![QueryOutcome::Failed(anyhow::anyhow!("boom"))],
    );
    let wikidata = ScriptedSource::new(
        "Wikidata",
        vec![QueryOutcome::Bindings(binding(&[("surname", "Doe")]))],
    );
    let sources = vec![boxed(&getty), boxed(&wikidata)];

    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();

    assert!(report.aborted_at.is_none());
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(report.resolved[0].get(Field::Surname), "Doe");
}

#[tokio::test]
async fn dedupe_merges_rows_before_processing() {
    let candidates = collect_candidates(
        &records(&[("\"Jane Doe\" (attrib.)", "1923"), ("Jane Doe", "1939")]),
        "unbekannt",
    );
    assert_eq!(candidates.len(), 1);
    let mut registry = MockRegistry::empty();
    let sources: Vec<Box<dyn ExternalSource>> = vec![];
    let report = reconcile(&mut registry, &sources, &http(), candidates, COOLDOWN)
        .await
        .unwrap();
    assert_eq!(registry.calls, 1);
    assert_eq!(report.unresolved[0].dates, vec!["1923", "1939"]);
}

#[test]
fn compound_cells_share_the_row_timeline() {
    let candidates = collect_candidates(
        &records(&[("Jane Doe and John Roe", "c. 1923-1939")]),
        "unbekannt",
    );
    assert_eq!(candidates.len(), 2);
    for candidate in candidates.values() {
        assert_eq!(candidate.earliest_year(), Some("1923"));
        assert_eq!(candidate.latest_year(), Some("1939"));
    }
}
