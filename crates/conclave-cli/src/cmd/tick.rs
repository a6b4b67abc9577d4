use crate::output::print_json;
use anyhow::Context;
use conclave_core::client::ConclaveClient;
use conclave_core::config::Config;
use conclave_core::notify::{LogNotifier, Notify, WebhookNotifier};
use conclave_core::tick::run_tick;

pub fn run(dry_run: bool, json: bool) -> anyhow::Result<()> {
    let (mut config, warnings) = Config::from_env().context("invalid configuration")?;
    for w in &warnings {
        tracing::warn!("{}", w.message);
    }
    if dry_run {
        config.dry_run = true;
    }

    let client = ConclaveClient::new(&config).context("failed to create API client")?;
    let notifier: Box<dyn Notify> = if config.dry_run {
        Box::new(LogNotifier)
    } else {
        Box::new(WebhookNotifier::new(&config.notify).context("failed to create notifier")?)
    };

    let outcome = match run_tick(&config, &client, notifier.as_ref()) {
        Ok(outcome) => outcome,
        Err(e) => {
            notifier.notify(&format!("tick failed: {e}"));
            return Err(e).context("tick failed");
        }
    };

    tracing::info!(%outcome, "tick finished");
    if json {
        let value = serde_json::json!({
            "outcome": outcome,
            "dry_run": config.dry_run,
            "finished_at": chrono::Utc::now().to_rfc3339(),
        });
        print_json(&value)?;
    } else {
        println!("{outcome}");
    }
    Ok(())
}
