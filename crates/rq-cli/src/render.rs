//! Terminal tables.

use tabled::builder::Builder;
use tabled::settings::Style;

use rq_core::wire::IndexStats;
use rq_core::{
    AggregationBucket, ColumnDefinition, FieldEntry, FieldSample, FilterRow, SearchResult,
    TimelineBucket,
};

const MAX_CELL: usize = 80;
const BAR_WIDTH: usize = 40;

fn finish(builder: Builder) -> String {
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}

/// Cut a cell to `max` characters, on a char boundary.
pub fn truncate(value: &str, max: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn results_table(columns: &[ColumnDefinition], results: &[SearchResult]) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once("#".to_string()).chain(columns.iter().map(|c| c.label.clone())),
    );
    for (row, result) in results.iter().enumerate() {
        builder.push_record(std::iter::once(row.to_string()).chain(columns.iter().map(|c| {
            result
                .column_value(&c.field)
                .map(|v| truncate(&v, MAX_CELL))
                .unwrap_or_default()
        })));
    }
    finish(builder)
}

pub fn buckets_table(field: &str, buckets: &[AggregationBucket]) -> String {
    let mut builder = Builder::default();
    builder.push_record([field.to_string(), "count".to_string()]);
    for b in buckets {
        builder.push_record([truncate(&b.key, MAX_CELL), b.count.to_string()]);
    }
    finish(builder)
}

/// Histogram bar scaled against the largest bucket.
pub fn bar(count: u64, max: u64) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let width = ((count as f64 / max as f64) * BAR_WIDTH as f64).ceil() as usize;
    "#".repeat(width.clamp(1, BAR_WIDTH))
}

pub fn timeline_table(buckets: &[TimelineBucket]) -> String {
    let max = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    let mut builder = Builder::default();
    builder.push_record(["timestamp", "count", ""]);
    for b in buckets {
        builder.push_record([b.timestamp.clone(), b.count.to_string(), bar(b.count, max)]);
    }
    finish(builder)
}

pub fn fields_table(samples: &[&FieldSample]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["field", "sample value"]);
    for s in samples {
        builder.push_record([s.field.clone(), truncate(&s.value, MAX_CELL)]);
    }
    finish(builder)
}

pub fn filters_table(rows: &[FilterRow]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["id", "field", "operator", "value", ""]);
    for r in rows {
        let status = if r.is_complete() { "" } else { "incomplete" };
        builder.push_record([
            r.id.clone(),
            r.field.clone(),
            r.operator.to_string(),
            r.value.clone(),
            status.to_string(),
        ]);
    }
    finish(builder)
}

pub fn entries_table(entries: &[FieldEntry]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["#", "path", "value"]);
    for (i, e) in entries.iter().enumerate() {
        builder.push_record([i.to_string(), e.path.clone(), truncate(&e.value, MAX_CELL)]);
    }
    finish(builder)
}

/// `524288` -> `"512.0 KiB"`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn stats_table(stats: &IndexStats) -> String {
    let mut builder = Builder::default();
    builder.push_record(["case", stats.case_id.as_str()]);
    builder.push_record(["index", stats.index_name.as_str()]);
    builder.push_record(["documents".to_string(), stats.document_count.to_string()]);
    builder.push_record(["size".to_string(), human_bytes(stats.size_bytes)]);
    builder.push_record(["shards".to_string(), stats.shard_count.to_string()]);
    builder.push_record(["replicas".to_string(), stats.replica_count.to_string()]);
    finish(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ünïcödé-string", 5), "ünïc…");
        assert_eq!(truncate("two\nlines", 20), "two lines");
    }

    #[test]
    fn test_bar_scales_to_max() {
        assert_eq!(bar(0, 10), "");
        assert_eq!(bar(10, 10).len(), BAR_WIDTH);
        assert_eq!(bar(1, 1000), "#");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(524288), "512.0 KiB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_stats_table() {
        let out = stats_table(&IndexStats {
            case_id: "CASE-1".into(),
            index_name: "case_case-1".into(),
            document_count: 137,
            size_bytes: 2048,
            shard_count: 1,
            replica_count: 0,
        });
        assert!(out.contains("case_case-1"));
        assert!(out.contains("137"));
        assert!(out.contains("2.0 KiB"));
    }

    #[test]
    fn test_results_table_uses_column_values() {
        let row = SearchResult::from_hit(
            json!({"@timestamp": "2024-05-01T10:00:00Z", "user": {"name": "alice"}}),
            0,
        );
        let columns = vec![
            ColumnDefinition::for_field("timestamp"),
            ColumnDefinition::for_field("user.name"),
        ];
        let out = results_table(&columns, &[row]);
        assert!(out.contains("Timestamp"));
        assert!(out.contains("user.name"));
        assert!(out.contains("alice"));
    }
}
