use crate::output::{print_json, print_table, read_input};
use anyhow::Context;
use conclave_core::allocation::build_allocation;
use conclave_core::types::Idea;
use std::path::Path;

/// Compute an allocation over ideas read from a JSON array.
pub fn run(
    file: &Path,
    self_id: Option<&str>,
    self_percent: i64,
    json: bool,
) -> anyhow::Result<()> {
    let raw = read_input(file)?;
    let ideas: Vec<Idea> = serde_json::from_str(&raw).context("expected a JSON array of ideas")?;

    let Some(allocation) = build_allocation(&ideas, self_id, self_percent) else {
        anyhow::bail!("no valid allocation from {} idea(s)", ideas.len());
    };

    if json {
        return print_json(&allocation);
    }
    let rows: Vec<Vec<String>> = allocation
        .allocations
        .iter()
        .map(|e| vec![e.idea_id.clone(), format!("{}%", e.percent)])
        .collect();
    print_table(&["IDEA", "PERCENT"], &rows);
    Ok(())
}
