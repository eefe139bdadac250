//! Text helpers: control-character stripping and markdown rendering of rows.

use serde_json::Value;

use protea_storage::QueryRows;

/// Remove control characters, keeping newlines and tabs.
pub fn remove_control_characters(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Render a query result as a markdown table followed by the query text.
///
/// A truncated result gets a trailing note.
pub fn rows_to_markdown(rows: &QueryRows, sql: &str) -> String {
    let mut out = String::new();

    if rows.rows.is_empty() {
        out.push_str("No matching records.\n");
    } else {
        out.push_str(&table_line(rows.columns.iter().map(|c| escape_cell(c))));
        out.push_str(&table_line(rows.columns.iter().map(|_| "---".to_string())));
        for row in &rows.rows {
            out.push_str(&table_line(row.iter().map(cell_text)));
        }

        if rows.truncated {
            out.push_str(&format!(
                "\n_... more rows not shown (first {})_\n",
                rows.rows.len()
            ));
        }
    }

    out.push_str(&format!("\nQuery: {}", sql.trim()));
    out
}

fn table_line(cells: impl Iterator<Item = String>) -> String {
    let cells: Vec<String> = cells.collect();
    format!("| {} |\n", cells.join(" | "))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_cell(s),
        other => escape_cell(&other.to_string()),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}
