//! Status command - freshness of the record a query maps to

use std::io::Write;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use super::params::{build_query, parse_param};
use crate::domain::{CacheIndexRecord, CacheKey, QueryValue};
use crate::infrastructure::cache::CacheStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Source id, e.g. connector.place_context
    pub source_id: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, QueryValue)>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Freshness of one cache key at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Missing,
    Fresh,
    Stale,
}

impl RecordState {
    pub fn of(record: Option<&CacheIndexRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self::Missing,
            Some(record) if record.is_fresh(now) => Self::Fresh,
            Some(_) => Self::Stale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    source_id: &'a str,
    cache_key: &'a str,
    query_signature: &'a str,
    status: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a CacheIndexRecord>,
}

pub async fn run(args: &StatusArgs, store: &CacheStore, out: &mut dyn Write) -> anyhow::Result<()> {
    let query = build_query(&args.params);
    let key = CacheKey::derive(&args.source_id, &query);
    let record = store.lookup(&args.source_id, &key.hash).await?;
    let state = RecordState::of(record.as_ref(), Utc::now());

    let report = StatusReport {
        source_id: &args.source_id,
        cache_key: &key.hash,
        query_signature: &key.signature,
        status: state,
        expires_at: record.as_ref().and_then(CacheIndexRecord::expires_at),
        record: record.as_ref(),
    };

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    writeln!(out, "source:    {}", report.source_id)?;
    writeln!(out, "key:       {}", report.cache_key)?;
    writeln!(out, "signature: {}", report.query_signature)?;
    writeln!(out, "status:    {}", state.as_str())?;
    if let Some(record) = report.record {
        writeln!(out, "artifact:  {}", store.resolve(record).display())?;
        writeln!(out, "created:   {}", record.created_at.to_rfc3339())?;
        match report.expires_at {
            Some(expires_at) => writeln!(out, "expires:   {}", expires_at.to_rfc3339())?,
            None => writeln!(out, "expires:   never fresh (ttl 0)")?,
        }
        writeln!(out, "rows:      {}", record.row_count)?;
        if let Some(as_of) = &record.as_of {
            writeln!(out, "as of:     {}", as_of)?;
        }
    }
    Ok(())
}
