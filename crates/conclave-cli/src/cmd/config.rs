use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use conclave_core::config::{Config, WarnLevel};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the environment and show the resolved settings
    Check,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Check => check(json),
    }
}

fn check(json: bool) -> anyhow::Result<()> {
    let (config, warnings) = Config::from_env().context("invalid configuration")?;

    if json {
        let value = serde_json::json!({
            "api_url": config.api_url,
            "notify_chat_id": config.notify.chat_id,
            "notify_on_success": config.notify.on_success,
            "self_id": config.self_id,
            "self_percent": config.self_percent,
            "max_join_attempts": config.max_join_attempts,
            "rank_policy": config.rank_policy.to_string(),
            "max_content_len": config.max_content_len,
            "dry_run": config.dry_run,
            "retry_attempts": config.retry.max_attempts,
            "warnings": warnings,
        });
        return print_json(&value);
    }

    println!("API:            {}", config.api_url);
    println!("Self idea:      {}", config.self_id.as_deref().unwrap_or("-"));
    println!("Self percent:   {}", config.self_percent);
    println!("Join attempts:  {}", config.max_join_attempts);
    println!("Rank policy:    {}", config.rank_policy);
    println!("Content limit:  {}", config.max_content_len);
    println!("Notify success: {}", config.notify.on_success);
    println!("Dry run:        {}", config.dry_run);

    if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Notice => "notice",
                WarnLevel::Clamped => "clamped",
            };
            println!("[{prefix}] {}", w.message);
        }
    }
    Ok(())
}
