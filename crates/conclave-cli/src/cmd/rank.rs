use crate::output::{print_json, print_table, read_input};
use anyhow::Context;
use conclave_core::client::parse_debate_listing;
use conclave_core::selector::{select_order, RankPolicy};
use std::path::Path;

/// Rank a saved `GET /list` response without touching the network.
pub fn run(file: &Path, policy: &str, json: bool) -> anyhow::Result<()> {
    let policy = RankPolicy::parse(policy).context("invalid rank policy")?;
    let raw = read_input(file)?;
    let debates = parse_debate_listing(&raw).context("failed to parse debate list")?;
    let ordered = select_order(&debates, &policy);

    if json {
        let value = serde_json::json!({
            "policy": policy.to_string(),
            "listed": debates.len(),
            "order": ordered,
        });
        return print_json(&value);
    }

    if ordered.is_empty() {
        println!("No eligible debates ({} listed).", debates.len());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = ordered
        .iter()
        .enumerate()
        .map(|(i, d)| {
            vec![
                (i + 1).to_string(),
                d.id.clone().unwrap_or_default(),
                d.phase().to_string(),
                d.occupancy.to_string(),
                d.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                d.title.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["RANK", "ID", "PHASE", "OCCUPANCY", "CAPACITY", "TITLE"], &rows);
    Ok(())
}
