use serde_json::Value;
use usdata_core::Envelope;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Widest cell printed in table mode before truncation.
const MAX_CELL_WIDTH: usize = 48;

pub fn render_envelope(
    envelope: &Envelope,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => println!("{}", envelope.to_json(pretty)?),
        OutputFormat::Table => render_envelope_table(envelope)?,
    }
    Ok(())
}

pub fn render_catalogue(
    catalogue: &[Value],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(catalogue)?
            } else {
                serde_json::to_string(catalogue)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => {
            let columns = [
                String::from("provider"),
                String::from("name"),
                String::from("description"),
            ];
            for line in table_lines(&columns, catalogue) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn render_envelope_table(envelope: &Envelope) -> Result<(), CliError> {
    println!("success : {}", envelope.success);
    if let Some(error) = &envelope.error {
        println!("error   : {error}");
    }
    println!("count   : {}", envelope.count());

    println!("metadata:");
    let metadata = serde_json::to_string_pretty(&envelope.metadata)?;
    for line in metadata.lines() {
        println!("  {line}");
    }

    if envelope.data.is_empty() {
        return Ok(());
    }
    println!("data:");
    let rows: Vec<Value> = envelope.data.iter().cloned().map(Value::Object).collect();
    for line in table_lines(&column_names(&rows), &rows) {
        println!("  {line}");
    }
    Ok(())
}

/// Union of row keys in first-seen order.
fn column_names(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        for key in row.keys() {
            if !columns.iter().any(|column| column == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let mut clipped: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        clipped.push_str("...");
        clipped
    } else {
        text
    }
}

fn table_lines(columns: &[String], rows: &[Value]) -> Vec<String> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|column| cell(row.get(column))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .map(|row| row[index].chars().count())
                .chain(std::iter::once(column.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect();

    let render = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(render(columns));
    lines.push(render(
        &widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>(),
    ));
    lines.extend(cells.iter().map(|row| render(row)));
    lines
}
