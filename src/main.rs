//! # Loyalty Monitor CLI (`lmon`)
//!
//! The `lmon` binary drives the report update pipeline: index new source
//! documents, assess tracked metrics against the baseline report, and
//! review the resulting proposals.
//!
//! ## Usage
//!
//! ```bash
//! lmon --config ./config/lmon.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lmon init` | Create the SQLite index |
//! | `lmon metrics` | List tracked metrics |
//! | `lmon chunk <file>` | Show how a file would be chunked |
//! | `lmon index` | Chunk and embed the input directory |
//! | `lmon retrieve "<query>"` | Nearest indexed chunks |
//! | `lmon section show\|set\|list` | Read or edit report sections |
//! | `lmon assess <metric>` | Assess one metric |
//! | `lmon summarize <metric>` | Summarize context for one metric |
//! | `lmon run` | Assess every metric and record proposals |
//! | `lmon proposals list\|approve\|reject` | Review proposals |
//!
//! Set `RUST_LOG=info` (or `debug`) for progress logs on stderr.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use loyalty_monitor::commands::{self, SectionBody};
use loyalty_monitor::config;
use loyalty_monitor::migrate;

/// Loyalty Monitor CLI: keeps a brand-loyalty report current as new
/// documents arrive.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lmon.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lmon",
    about = "Loyalty Monitor: retrieval-assisted updates for a brand-loyalty report",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lmon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database. Safe to run repeatedly.
    Init,

    /// List metric names from the metrics table.
    Metrics,

    /// Chunk one file and print chunk ids and token ranges.
    ///
    /// Nothing is embedded or stored.
    Chunk {
        /// File to chunk (.md, .markdown, .txt or .pdf).
        file: PathBuf,

        /// Override `chunking.max_tokens`.
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Override `chunking.overlap_tokens`.
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Chunk and embed every document in the input directory.
    ///
    /// Chunks whose text is unchanged since the last run are not
    /// re-embedded. Requires an embedding provider.
    Index,

    /// Show the indexed chunks nearest to a query.
    Retrieve {
        query: String,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Read or edit sections of the report.
    Section {
        #[command(subcommand)]
        action: SectionAction,
    },

    /// Retrieve context for one metric and ask whether its section needs
    /// revising. Nothing is written.
    Assess { metric: String },

    /// Summarize what the indexed documents say about one metric.
    Summarize { metric: String },

    /// Run the full pipeline: index, assess every metric, and record
    /// proposals in the ledger.
    Run,

    /// Review proposed updates.
    Proposals {
        #[command(subcommand)]
        action: ProposalAction,
    },
}

#[derive(Subcommand)]
enum SectionAction {
    /// Print the body of a section.
    Show { metric: String },

    /// Replace the body of a section.
    Set {
        metric: String,

        #[command(flatten)]
        body: BodyArgs,
    },

    /// List report headings.
    List,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct BodyArgs {
    /// New body text.
    #[arg(long)]
    text: Option<String>,

    /// Read the new body from a file.
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ProposalAction {
    /// List pending proposals.
    List {
        /// Include approved and rejected proposals.
        #[arg(long)]
        all: bool,
    },

    /// Apply the pending proposal for a metric to the report.
    Approve { metric: String },

    /// Discard the pending proposal for a metric.
    Reject { metric: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Metrics => commands::run_metrics(&cfg)?,
        Commands::Chunk {
            file,
            max_tokens,
            overlap,
        } => commands::run_chunk(&cfg, &file, max_tokens, overlap)?,
        Commands::Index => commands::run_index(&cfg).await?,
        Commands::Retrieve { query, k } => commands::run_retrieve(&cfg, &query, k).await?,
        Commands::Section { action } => match action {
            SectionAction::Show { metric } => commands::run_section_show(&cfg, &metric).await?,
            SectionAction::Set { metric, body } => {
                let body = match (&body.text, &body.file) {
                    (Some(text), _) => SectionBody::Text(text),
                    (None, Some(path)) => SectionBody::File(path),
                    (None, None) => anyhow::bail!("one of --text or --file is required"),
                };
                commands::run_section_set(&cfg, &metric, body).await?;
            }
            SectionAction::List => commands::run_section_list(&cfg).await?,
        },
        Commands::Assess { metric } => commands::run_assess(&cfg, &metric).await?,
        Commands::Summarize { metric } => commands::run_summarize(&cfg, &metric).await?,
        Commands::Run => commands::run_pipeline(&cfg).await?,
        Commands::Proposals { action } => match action {
            ProposalAction::List { all } => commands::run_proposals_list(&cfg, all)?,
            ProposalAction::Approve { metric } => {
                commands::run_proposals_approve(&cfg, &metric).await?
            }
            ProposalAction::Reject { metric } => commands::run_proposals_reject(&cfg, &metric)?,
        },
    }

    Ok(())
}
