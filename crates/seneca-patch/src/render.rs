//! Pure markup rendering
//!
//! Every function here is a pure function of its inputs so each record
//! kind's markup can be tested in isolation.

use seneca_record::TableData;
use std::fmt::Write as _;

/// Escape text for use in element content and quoted attributes
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`]
#[must_use]
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Display text of a table cell; strings are shown without quotes
#[must_use]
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One `<tr>` per key, in key order
#[must_use]
pub fn table_rows(data: &TableData) -> String {
    let mut rows = String::new();
    for (key, value) in data {
        let _ = write!(
            rows,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(key),
            escape_html(&cell_text(value))
        );
    }
    rows
}

/// Complete `<table>` with caption `file (name)`
#[must_use]
pub fn table_html(routine_file: &str, name: &str, data: &TableData) -> String {
    format!(
        "<table><caption>{} ({})</caption><tbody>{}</tbody></table>",
        escape_html(routine_file),
        escape_html(name),
        table_rows(data)
    )
}

/// Hidden, initially empty plot container
#[must_use]
pub fn plot_container(dom_id: &str, description: Option<&str>) -> String {
    format!(
        "<div id=\"{}\" class=\"plot-container\" title=\"{}\" style=\"display: none;\"></div>",
        dom_id,
        escape_html(description.unwrap_or_default())
    )
}

/// Hidden table container wrapping a rendered table
#[must_use]
pub fn table_container(
    dom_id: &str,
    description: Option<&str>,
    routine_file: &str,
    name: &str,
    data: &TableData,
) -> String {
    format!(
        "<div id=\"{}\" class=\"table-container\" title=\"{}\" style=\"display: none;\">{}</div>",
        dom_id,
        escape_html(description.unwrap_or_default()),
        table_html(routine_file, name, data)
    )
}

/// Entry in a routine's element list
#[must_use]
pub fn list_entry(dom_id: &str, name: &str, label: &str) -> String {
    format!(
        "<li class=\"plot-list-item invisible\" data-id=\"{}\">{} - {}</li>",
        dom_id,
        escape_html(name),
        label
    )
}

/// Titled list container for a routine
#[must_use]
pub fn routine_container(list_id: &str, routine_file: &str) -> String {
    format!(
        "<ul class=\"plot-list-routine\" id=\"{}\"><li class=\"plot-list-routine-title invisible\"><b>{}</b></li></ul>",
        list_id,
        escape_html(routine_file)
    )
}
