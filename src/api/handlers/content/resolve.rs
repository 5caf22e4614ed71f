//! Ordered-source resolution: primary store first, legacy fallback second,
//! degrade to empty or defaults instead of failing.
//!
//! The same policy backs every public read path, so it lives here once
//! instead of being re-derived per entity type.

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::records::ContentRecord;

/// Outcome of reading one source, kept for diagnostics on the admin views.
#[derive(Clone, Debug, Serialize)]
pub struct SourceDiagnostics {
    pub ok: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceDiagnostics {
    fn from_result<T>(result: &Result<Vec<T>, anyhow::Error>) -> Self {
        match result {
            Ok(records) => Self {
                ok: true,
                count: records.len(),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                count: 0,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

#[derive(Debug)]
pub struct Resolved<T> {
    pub records: Vec<T>,
    pub primary: SourceDiagnostics,
    pub fallback: SourceDiagnostics,
}

/// Merge the primary and fallback reads into one stable result set.
///
/// Selection policy: a reachable, non-empty primary owns the result and the
/// fallback may only supplement ids the primary does not have. A failed or
/// empty primary yields the fallback in full. Either way the result is
/// deduplicated by each record's composite key, first occurrence winning, so
/// primary-sourced records beat supplemental ones on ties. An empty result is
/// valid, never an error.
pub fn merge_sources<T: ContentRecord>(
    primary: Result<Vec<T>, anyhow::Error>,
    fallback: Result<Vec<T>, anyhow::Error>,
) -> Resolved<T> {
    let primary_diag = SourceDiagnostics::from_result(&primary);
    let fallback_diag = SourceDiagnostics::from_result(&fallback);

    let primary_records = primary.unwrap_or_default();
    let fallback_records = fallback.unwrap_or_default();

    let merged: Vec<T> = if primary_diag.ok && !primary_records.is_empty() {
        let known: HashSet<String> = primary_records
            .iter()
            .map(|record| record.id().to_string())
            .collect();
        let supplemental: Vec<T> = fallback_records
            .into_iter()
            .filter(|record| !record.id().is_empty() && !known.contains(record.id()))
            .collect();
        if !supplemental.is_empty() {
            info!(
                count = supplemental.len(),
                "adding supplemental legacy records missing from the primary store"
            );
        }
        primary_records.into_iter().chain(supplemental).collect()
    } else {
        fallback_records
    };

    let before = merged.len();
    let mut seen = HashSet::new();
    let records: Vec<T> = merged
        .into_iter()
        .filter(|record| seen.insert(record.dedupe_key()))
        .collect();
    if records.len() != before {
        info!(
            removed = before - records.len(),
            "collapsed duplicate content records"
        );
    }

    Resolved {
        records,
        primary: primary_diag,
        fallback: fallback_diag,
    }
}
