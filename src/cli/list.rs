//! List command - index records under a cache root

use std::io::Write;

use chrono::Utc;
use clap::Args;
use serde::Serialize;

use super::status::RecordState;
use crate::domain::CacheIndexRecord;
use crate::infrastructure::cache::CacheStore;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list records for this source id
    #[arg(long)]
    pub source: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ListedRecord<'a> {
    #[serde(flatten)]
    record: &'a CacheIndexRecord,
    status: RecordState,
}

pub async fn run(args: &ListArgs, store: &CacheStore, out: &mut dyn Write) -> anyhow::Result<()> {
    let records = store.list(args.source.as_deref()).await?;
    let now = Utc::now();

    if args.json {
        let listed: Vec<ListedRecord<'_>> = records
            .iter()
            .map(|record| ListedRecord {
                record,
                status: RecordState::of(Some(record), now),
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&listed)?)?;
        return Ok(());
    }

    if records.is_empty() {
        writeln!(out, "No cached records")?;
        return Ok(());
    }

    for record in &records {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\trows={}\tttl_days={}",
            record.source_id,
            record.key_hash,
            RecordState::of(Some(record), now).as_str(),
            record.created_at.to_rfc3339(),
            record.row_count,
            record.ttl_days,
        )?;
    }
    Ok(())
}
