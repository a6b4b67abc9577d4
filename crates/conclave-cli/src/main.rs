mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "conclave",
    about = "Scheduled tick runner for Conclave debates: join, propose, comment, allocate",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one tick against the Conclave API (reads CONCLAVE_* settings)
    Tick {
        /// Decide but do not send mutating requests or notifications
        #[arg(long)]
        dry_run: bool,
    },

    /// Rank debates from a saved list response (`-` for stdin)
    Rank {
        file: PathBuf,
        /// Comma-separated rank keys: phase, occupancy_asc, occupancy_desc
        #[arg(long, default_value = "phase,occupancy_asc")]
        policy: String,
    },

    /// Compute an allocation over ideas from a JSON array (`-` for stdin)
    Allocate {
        file: PathBuf,
        /// Our own idea id
        #[arg(long)]
        self_id: Option<String>,
        /// Percentage reserved for our own idea (clamped to 0-60)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        self_percent: i64,
    },

    /// Classify text into a topic category and derive its ticker
    Classify {
        #[arg(required = true)]
        text: Vec<String>,
        /// Seed for the hashed ticker fallback
        #[arg(long, default_value = "conclave")]
        seed: String,
    },

    /// Render the proposal a tick would submit for the given text
    Draft {
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long, default_value = "conclave")]
        seed: String,
        /// Maximum length of the rendered proposal, in characters
        #[arg(long, default_value = "2000")]
        max_len: usize,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Tick { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Tick { dry_run } => cmd::tick::run(dry_run, cli.json),
        Commands::Rank { file, policy } => cmd::rank::run(&file, &policy, cli.json),
        Commands::Allocate {
            file,
            self_id,
            self_percent,
        } => cmd::allocate::run(&file, self_id.as_deref(), self_percent, cli.json),
        Commands::Classify { text, seed } => cmd::classify::run(&text.join(" "), &seed, cli.json),
        Commands::Draft {
            text,
            seed,
            max_len,
        } => cmd::classify::draft(&text.join(" "), &seed, max_len, cli.json),
        Commands::Config { subcommand } => cmd::config::run(subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
