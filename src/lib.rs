pub mod agentic_loop;
pub mod audit;
pub mod config;
pub mod conversation;
pub mod dialog;
pub mod document;
pub mod events;
pub mod models;
pub mod prompts;
pub mod semantic_patch;
pub mod terminal;

#[cfg(test)]
mod test_support;

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::audit::AuditLog;
use crate::config::{AppConfig, ConfigOverrides};
use crate::dialog::DialogDriver;
use crate::document::{reorder_top_level_sections, seed_if_missing, write_whole_file};
use crate::events::{FanoutReporter, Reporter, SpecEvent};
use crate::models::openai_compat::OpenAiCompatGenerator;
use crate::models::ObservedGenerator;
use crate::prompts::PromptSet;
use crate::semantic_patch::PatchPipeline;
use crate::terminal::{ConsolePrompter, ConsoleReporter};

/// Environment variable holding the tracing filter
pub const LOG_ENV: &str = "SPECWRIGHT_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "specwright",
    version,
    about = "Evolve a living Markdown spec through LLM-proposed diffs"
)]
pub struct Cli {
    /// Markdown spec file to evolve
    #[arg(short, long, value_name = "FILE")]
    pub spec: Option<PathBuf>,

    /// Let the model answer its own questions for a number of turns
    #[arg(long)]
    pub auto: bool,

    /// Number of autonomous turns
    #[arg(short, long)]
    pub turns: Option<usize>,

    /// Directory with pm_ask.txt, arch_answer.txt, sys_patch.txt, pending_patch.txt
    #[arg(long, value_name = "DIR")]
    pub prompts: Option<PathBuf>,

    /// Directory for JSONL audit logs
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,

    /// Do not write an audit log
    #[arg(long, conflicts_with = "audit_dir")]
    pub no_audit: bool,

    /// API config file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Apply one diff file to the spec and exit
    #[arg(long, value_name = "DIFF_FILE", conflicts_with_all = ["auto", "reorder"])]
    pub apply: Option<PathBuf>,

    /// Sort the spec's top-level sections by title and exit
    #[arg(long, conflicts_with = "auto")]
    pub reorder: bool,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            spec_path: self.spec.clone(),
            auto_turns: self.turns,
            prompts_dir: self.prompts.clone(),
            audit_dir: self.audit_dir.clone(),
            no_audit: self.no_audit,
            config_path: self.config.clone(),
        }
    }
}

/// Install the stderr log subscriber, filtered by `SPECWRIGHT_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = AppConfig::resolve(&cli.overrides()).context("failed to load configuration")?;
    run_with(&cli, &config)
}

fn run_with(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    if seed_if_missing(&config.spec_path)? {
        info!(path = %config.spec_path.display(), "seeded new spec");
    }

    let console = ConsoleReporter::new();
    if cli.reorder {
        let text = fs::read_to_string(&config.spec_path)
            .with_context(|| format!("failed to read {}", config.spec_path.display()))?;
        write_whole_file(&config.spec_path, &reorder_top_level_sections(&text))?;
        console.emit(&SpecEvent::notice(format!(
            "Reordered top-level sections of {}",
            config.spec_path.display()
        )));
        return Ok(());
    }

    let audit = match &config.audit_dir {
        Some(dir) => Some(
            AuditLog::create(dir)
                .with_context(|| format!("failed to open audit log in {}", dir.display()))?,
        ),
        None => None,
    };
    let mut reporter = FanoutReporter::new().with(&console);
    if let Some(audit) = audit.as_ref() {
        reporter = reporter.with(audit);
    }

    let prompts = PromptSet::load(&config.prompts_dir);
    let backend = OpenAiCompatGenerator::new(config.api.clone(), prompts)
        .context("failed to build the model client")?;
    let generator = ObservedGenerator::new(&backend, &reporter);

    if let Some(diff_path) = &cli.apply {
        let diff = fs::read_to_string(diff_path)
            .with_context(|| format!("failed to read diff {}", diff_path.display()))?;
        let outcome = PatchPipeline::new(&generator, &reporter).apply(&config.spec_path, &diff)?;
        info!(strategy = %outcome.strategy(), "diff file processed");
        return Ok(());
    }

    let prompter = ConsolePrompter;
    let mut driver = DialogDriver::new(config, &generator, &reporter, &prompter);
    if cli.auto {
        driver.run_autonomous()?;
    } else {
        driver.run_manual()?;
    }
    Ok(())
}
