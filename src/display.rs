//! Plain-text and JSON renderings of result tables for the command line.

use serde_json::{json, Map, Value as JsonValue};

use crate::votable::{Value, VoTable};

const MAX_CELL_CHARS: usize = 40;

fn cell(value: &Value) -> String {
    let text = value.to_string().replace(['\n', '\r', '\t'], " ");
    if text.chars().count() > MAX_CELL_CHARS {
        let cut: String = text.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

/// Column-aligned text, showing at most `max_rows` rows.
pub fn render_table(table: &VoTable, max_rows: Option<usize>) -> String {
    let mut out = String::new();
    for url in &table.meta.url {
        out.push_str(&format!("# url: {}\n", url));
    }
    for error in &table.meta.error {
        out.push_str(&format!("# error: {}\n", error));
    }
    if table.fields.is_empty() {
        out.push_str("(no columns)\n");
        return out;
    }

    let shown = max_rows.unwrap_or(table.len()).min(table.len());
    let cells: Vec<Vec<String>> = table.rows[..shown]
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let mut widths: Vec<usize> = table.fields.iter().map(|f| f.name.chars().count()).collect();
    for row in &cells {
        for (width, text) in widths.iter_mut().zip(row) {
            *width = (*width).max(text.chars().count());
        }
    }

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end()
            .to_string()
    };

    out.push_str(&line(table.column_names()));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    if shown < table.len() {
        out.push_str(&format!("... {} more rows\n", table.len() - shown));
    }
    out.push_str(&format!("Length = {} rows\n", table.len()));
    out
}

/// Rows as JSON objects keyed by column name, with provenance but without raw XML.
pub fn table_to_json(table: &VoTable) -> JsonValue {
    let rows: Vec<JsonValue> = table
        .rows
        .iter()
        .map(|row| {
            let mut record = Map::new();
            for (field, value) in table.fields.iter().zip(row) {
                let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                record.insert(field.name.clone(), value);
            }
            JsonValue::Object(record)
        })
        .collect();
    json!({
        "url": table.meta.url,
        "queried_at": table.meta.queried_at,
        "error": table.meta.error,
        "columns": table.column_names(),
        "rows": rows,
    })
}
