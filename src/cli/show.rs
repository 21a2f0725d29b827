//! Show command - print a cached artifact without contacting any connector

use std::io::Write;

use anyhow::bail;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::params::{build_query, parse_param};
use super::status::RecordState;
use crate::domain::{CacheIndexRecord, CacheKey, QueryValue, Table};
use crate::infrastructure::cache::CacheStore;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Source id, e.g. connector.place_context
    pub source_id: String,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, QueryValue)>,

    /// Maximum rows to print in text mode
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ShownArtifact<'a> {
    source_id: &'a str,
    cache_key: &'a str,
    status: RecordState,
    record: &'a CacheIndexRecord,
    table: &'a Table,
}

pub async fn run(args: &ShowArgs, store: &CacheStore, out: &mut dyn Write) -> anyhow::Result<()> {
    let query = build_query(&args.params);
    let key = CacheKey::derive(&args.source_id, &query);
    let Some(record) = store.lookup(&args.source_id, &key.hash).await? else {
        bail!(
            "No cached artifact for '{}' with query {}",
            args.source_id,
            key.signature
        );
    };
    let table = store.load(&record).await?;
    let status = RecordState::of(Some(&record), Utc::now());

    if args.json {
        let shown = ShownArtifact {
            source_id: &args.source_id,
            cache_key: &key.hash,
            status,
            record: &record,
            table: &table,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&shown)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "# {} {} ({}, {} rows)",
        args.source_id,
        key.hash,
        status.as_str(),
        table.row_count()
    )?;
    writeln!(out, "{}", table.columns().join("\t"))?;
    for row in table.rows().iter().take(args.limit) {
        let cells: Vec<String> = table
            .columns()
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    if table.row_count() > args.limit {
        writeln!(out, "... {} more rows", table.row_count() - args.limit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn args(limit: usize, json: bool) -> ShowArgs {
        ShowArgs {
            source_id: "connector.place_context".to_string(),
            params: vec![parse_param("place_id=p-001").unwrap()],
            limit,
            json,
        }
    }

    async fn seeded_store(dir: &TempDir, args: &ShowArgs) -> CacheStore {
        let store = CacheStore::open(dir.path()).await.unwrap();
        let mut table = Table::new(["place_id", "value", "source_id"]);
        for i in 0..3 {
            table.push_row(
                json!({"place_id": "p-001", "value": i, "source_id": "connector.place_context"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );
        }
        let key = CacheKey::derive(&args.source_id, &build_query(&args.params));
        store
            .write(&args.source_id, &key.hash, &table, 1, None, None)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_text_output_respects_limit() {
        let dir = TempDir::new().unwrap();
        let args = args(2, false);
        let store = seeded_store(&dir, &args).await;
        let mut out = Vec::new();

        run(&args, &store, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("fresh, 3 rows"));
        assert_eq!(lines[1], "place_id\tvalue\tsource_id");
        assert_eq!(lines[2], "p-001\t0\tconnector.place_context");
        assert_eq!(lines.last().unwrap(), &"... 1 more rows");
    }

    #[tokio::test]
    async fn test_json_output_includes_table() {
        let dir = TempDir::new().unwrap();
        let args = args(20, true);
        let store = seeded_store(&dir, &args).await;
        let mut out = Vec::new();

        run(&args, &store, &mut out).await.unwrap();

        let shown: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(shown["status"], "fresh");
        assert_eq!(shown["table"]["rows"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path()).await.unwrap();
        let mut out = Vec::new();

        let result = run(&args(20, false), &store, &mut out).await;

        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
