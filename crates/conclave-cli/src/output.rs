use conclave_core::template::truncate;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Widest a table cell may grow before it is clipped.
const MAX_CELL: usize = 48;

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Columns whose every cell is a number are right-aligned; text cells
/// longer than [`MAX_CELL`] characters are clipped.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(headers.len())
                .map(|c| truncate(c, MAX_CELL))
                .collect()
        })
        .collect();

    let numeric: Vec<bool> = (0..headers.len())
        .map(|col| {
            !cells.is_empty()
                && cells
                    .iter()
                    .all(|row| row.get(col).is_some_and(|c| c.parse::<f64>().is_ok()))
        })
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(col, h)| {
            cells
                .iter()
                .filter_map(|row| row.get(col))
                .map(|c| c.chars().count())
                .fold(h.chars().count(), usize::max)
        })
        .collect();

    let line = |values: &[&str]| -> String {
        let padded: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(col, v)| {
                let width = widths[col];
                if numeric[col] {
                    format!("{v:>width$}")
                } else {
                    format!("{v:<width$}")
                }
            })
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = line(headers);
    let rules: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&line(&rules.iter().map(String::as_str).collect::<Vec<_>>()));
    for row in &cells {
        let values: Vec<&str> = (0..headers.len())
            .map(|col| row.get(col).map(String::as_str).unwrap_or(""))
            .collect();
        out.push_str(&line(&values));
    }
    out
}

/// Read a file, or stdin when `path` is `-`.
pub fn read_input(path: &std::path::Path) -> anyhow::Result<String> {
    use anyhow::Context;
    use std::io::Read;

    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
}
