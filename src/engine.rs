//! Batch reconciliation: dedupe, lookup, fan-out, classify.
//!
//! Candidates are processed strictly one at a time, in sorted canonical
//! name order: first the registry lookup, then — only for absent
//! records — each external source in priority order (the controlled
//! vocabulary first, the linked-data graph second). Later sources fill
//! gaps the earlier ones left but never overwrite. A rate-limit
//! exhaustion from any source aborts the remaining batch and records
//! the candidate that was in flight, so the operator can resume there
//! instead of restarting from scratch.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::authority::RegistryLookup;
use crate::models::Candidate;
use crate::source::{enrich, EnrichOutcome, ExternalSource};

/// One raw input row: a name cell plus its date expressions.
#[derive(Debug, Clone)]
pub struct InputRecord {
    pub name: String,
    pub dates: Vec<String>,
}

/// Result of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Found in the registry; carry their local id.
    pub existing: Vec<Candidate>,
    /// Absent locally, enriched by at least one external source.
    pub resolved: Vec<Candidate>,
    /// Absent locally and unknown to every external source.
    pub unresolved: Vec<Candidate>,
    /// Canonical name that was in flight when the batch aborted on
    /// rate-limit exhaustion; `None` when the batch ran to completion.
    pub aborted_at: Option<String>,
}

/// Build the deduplicated candidate set from raw input rows.
///
/// A name cell may hold several persons joined by `" and "`; each part
/// becomes its own candidate. Cells starting with `"Unknown"` are
/// replaced by the configured placeholder name. Rows that normalize to
/// the same canonical name merge their date expressions into one
/// candidate. The map is keyed by canonical name, which also fixes the
/// processing order.
pub fn collect_candidates(
    records: &[InputRecord],
    unknown_placeholder: &str,
) -> BTreeMap<String, Candidate> {
    let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
    for record in records {
        let cell = record.name.trim();
        let cell = if cell.starts_with("Unknown") {
            unknown_placeholder
        } else {
            cell
        };
        for input_name in cell.split(" and ") {
            let candidate = candidates
                .entry(crate::models::normalize_name(input_name))
                .or_insert_with(|| Candidate::new(input_name));
            for expr in &record.dates {
                candidate.add_date(expr);
            }
        }
    }
    candidates
}

/// Reconcile a candidate batch against the registry and the external
/// sources.
///
/// Registry transport failures are fatal and propagate; the session is
/// released by the caller on both paths. Per-candidate source failures
/// are non-fatal and leave the candidate unresolved for that source.
pub async fn reconcile(
    lookup: &mut dyn RegistryLookup,
    sources: &[Box<dyn ExternalSource>],
    http: &reqwest::Client,
    candidates: BTreeMap<String, Candidate>,
    cooldown: Duration,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for (_, mut candidate) in candidates {
        let found = lookup
            .find_local_id(candidate.name())
            .await
            .with_context(|| format!("registry lookup failed for {}", candidate.name()))?;
        if let Some(id) = found {
            candidate.set_local_id(&id);
            println!("Exists: {}", candidate.name());
            report.existing.push(candidate);
            continue;
        }

        let mut exhausted = false;
        for source in sources {
            println!("{} update: {}", source.name(), candidate.name());
            if enrich(source.as_ref(), http, &mut candidate, cooldown).await
                == EnrichOutcome::RateLimitExhausted
            {
                exhausted = true;
                break;
            }
        }

        candidate.refresh_derived();
        let name = candidate.name().to_string();
        if candidate.is_enriched() {
            report.resolved.push(candidate);
        } else {
            println!("Unknown artist: {name}");
            report.unresolved.push(candidate);
        }
        if exhausted {
            report.aborted_at = Some(name);
            break;
        }
    }
    Ok(report)
}
