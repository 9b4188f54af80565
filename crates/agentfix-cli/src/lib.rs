//! # AgentFix CLI
//!
//! Command-line interface for AgentFix.
//!
//! This module provides CLI commands for:
//! - Running the webhook service
//! - Dispatching a single auto-fix event from a file
//! - Running the Sentry stages one at a time over hand-off files, or all at once
//! - Validating and printing the resolved configuration
//!
//! Every command prints a JSON result on stdout; logs go to stderr.

use agentfix_api::{start_server, AppState, ServiceError};
use agentfix_core::dispatch::{
    build_dispatch_contexts, provider_from_config, BatchSummary, ContextDispatcher,
    DispatchContext, Orchestrator,
};
use agentfix_core::handoff::{
    read_json, write_json, DEFAULT_CONTEXTS_FILE, DEFAULT_ISSUES_FILE, DEFAULT_TO_FIX_FILE,
};
use agentfix_core::reconciler::{GitHubTracker, IssueTracker, ReconciliationRecord};
use agentfix_core::{
    AgentFixConfig, AgentFixError, AutoFixEvent, ConfigError, ExternalIssue, IssueSource,
    Pipeline, PipelineSettings, Reconciler, ReconcilerSettings, Requirement, SentryClient,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// AgentFix CLI - automated remediation for review findings and Sentry issues
#[derive(Parser)]
#[command(name = "agentfix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated remediation for review findings and Sentry issues")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "AGENTFIX_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level, overriding the configured one
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook service
    Serve {
        /// Port to bind, overriding `server.port`
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Dispatch one auto-fix event read from a JSON file
    Autofix {
        /// Path to the AutoFixEvent JSON file
        #[arg(short, long)]
        event_file: PathBuf,

        /// Render the prompt without dispatching
        #[arg(long)]
        dry_run: bool,
    },

    /// Sentry reconciliation stages
    Sentry {
        #[command(subcommand)]
        action: SentryCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Sentry stage subcommands
#[derive(Subcommand)]
pub enum SentryCommands {
    /// Fetch unresolved issues
    Fetch {
        #[arg(short, long, default_value = DEFAULT_ISSUES_FILE)]
        output: PathBuf,
    },

    /// Reconcile fetched issues against tracked issues
    Sync {
        #[arg(short, long, default_value = DEFAULT_ISSUES_FILE)]
        input: PathBuf,

        #[arg(short, long, default_value = DEFAULT_TO_FIX_FILE)]
        output: PathBuf,

        /// Hours before an open issue is requeued
        #[arg(long)]
        cooldown_hours: Option<f64>,
    },

    /// Build dispatch contexts from reconciled issues
    Contexts {
        #[arg(short, long, default_value = DEFAULT_TO_FIX_FILE)]
        input: PathBuf,

        #[arg(short, long, default_value = DEFAULT_CONTEXTS_FILE)]
        output: PathBuf,

        /// Maximum contexts to build
        #[arg(long)]
        max: Option<usize>,

        #[arg(long)]
        target_branch: Option<String>,
    },

    /// Dispatch built contexts
    Dispatch {
        #[arg(short, long, default_value = DEFAULT_CONTEXTS_FILE)]
        input: PathBuf,
    },

    /// Fetch, reconcile and dispatch in one run
    Run {
        #[arg(long)]
        cooldown_hours: Option<f64>,

        /// Maximum records to dispatch
        #[arg(long)]
        max: Option<usize>,

        #[arg(long)]
        target_branch: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate every requirement and list problems
    Check,

    /// Print the resolved configuration with secrets redacted
    Show {
        #[arg(short, long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("{0}")]
    Run(AgentFixError),

    #[error("{failures} dispatch(es) failed")]
    ItemsFailed { failures: usize },

    #[error("Failed to write output: {message}")]
    Output { message: String },

    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },
}

impl From<AgentFixError> for CliError {
    fn from(error: AgentFixError) -> Self {
        match error {
            AgentFixError::Configuration(e) => Self::Configuration(e),
            other => Self::Run(other),
        }
    }
}

impl CliError {
    /// Process exit code: 2 for configuration problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::Service(ServiceError::Configuration(_)) => 2,
            Self::Service(ServiceError::Startup(AgentFixError::Configuration(_))) => 2,
            _ => 1,
        }
    }
}

// ============================================================================
// Stage Summaries
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchSummary {
    count: usize,
    output_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncSummary {
    input_issues: usize,
    to_fix: usize,
    created: usize,
    reopened: usize,
    requeued: usize,
    skipped: usize,
    output_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextsSummary {
    to_fix: usize,
    selected: usize,
    output_file: String,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AgentFixConfig::load(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    initialize_logging(&level, cli.json_logs || config.logging.json_format)?;

    match cli.command {
        Commands::Serve { port } => execute_serve_command(config, port).await,
        Commands::Autofix {
            event_file,
            dry_run,
        } => execute_autofix_command(&config, &event_file, dry_run).await,
        Commands::Sentry { action } => execute_sentry_command(&config, action).await,
        Commands::Config { action } => execute_config_command(&config, action),
    }
}

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn initialize_logging(level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_serve_command(
    mut config: AgentFixConfig,
    port: Option<u16>,
) -> Result<(), CliError> {
    if let Some(port) = port {
        config.server.port = port;
    }
    let state = AppState::from_config(&config)?;
    start_server(&config, state).await?;
    Ok(())
}

async fn execute_autofix_command(
    config: &AgentFixConfig,
    event_file: &Path,
    dry_run: bool,
) -> Result<(), CliError> {
    let event: AutoFixEvent = read_json(event_file).await?;
    info!(
        issue_ref = %event.issue_ref,
        findings = event.findings.len(),
        dry_run,
        "Running auto-fix event"
    );

    let orchestrator = Orchestrator::new(provider_from_config(&config.remediation));
    let outcome = orchestrator.run_auto_fix(event, dry_run).await;
    print_json(&outcome)?;

    if outcome.is_ok() {
        Ok(())
    } else {
        Err(CliError::ItemsFailed { failures: 1 })
    }
}

async fn execute_sentry_command(
    config: &AgentFixConfig,
    action: SentryCommands,
) -> Result<(), CliError> {
    match action {
        SentryCommands::Fetch { output } => {
            config.validate(&[Requirement::IssueSource])?;
            let source = SentryClient::from_config(&config.sentry)?;
            let issues = source.fetch_unresolved().await?;
            write_json(&output, &issues).await?;
            print_json(&FetchSummary {
                count: issues.len(),
                output_file: output.display().to_string(),
            })
        }

        SentryCommands::Sync {
            input,
            output,
            cooldown_hours,
        } => {
            let config = &with_stage_overrides(config, cooldown_hours, None);
            config.validate(&[Requirement::Tracker])?;
            let issues: Vec<ExternalIssue> = read_json(&input).await?;
            let tracker = Arc::new(GitHubTracker::connect(config).await?);
            let reconciler = Reconciler::new(
                tracker.clone(),
                tracker,
                ReconcilerSettings::from_config(config),
            );

            let report = reconciler.reconcile(&issues, Utc::now()).await?;
            write_json(&output, &report.records).await?;

            let counters = report.counters;
            print_json(&SyncSummary {
                input_issues: counters.input_issues,
                to_fix: counters.to_fix(),
                created: counters.created,
                reopened: counters.reopened,
                requeued: counters.requeued,
                skipped: counters.skipped,
                output_file: output.display().to_string(),
            })
        }

        SentryCommands::Contexts {
            input,
            output,
            max,
            target_branch,
        } => {
            let repository = config.tracker.repository_name()?.to_string();
            let records: Vec<ReconciliationRecord> = read_json(&input).await?;
            let contexts = build_dispatch_contexts(
                &records,
                &repository,
                target_branch
                    .as_deref()
                    .unwrap_or(&config.dispatch.target_branch),
                max.unwrap_or(config.dispatch.max_fixes),
            );
            write_json(&output, &contexts).await?;
            print_json(&ContextsSummary {
                to_fix: records.len(),
                selected: contexts.len(),
                output_file: output.display().to_string(),
            })
        }

        SentryCommands::Dispatch { input } => {
            let contexts: Vec<DispatchContext> = read_json(&input).await?;
            if contexts.is_empty() {
                info!("No contexts selected for dispatch");
                return print_json(&BatchSummary::default());
            }

            let dispatcher = ContextDispatcher::new(
                Orchestrator::new(provider_from_config(&config.remediation)),
                comment_tracker(config).await,
            );
            let summary = dispatcher.dispatch_all(&contexts).await;
            print_json(&summary)?;
            finish_batch(&summary)
        }

        SentryCommands::Run {
            cooldown_hours,
            max,
            target_branch,
        } => {
            let config = &with_stage_overrides(config, cooldown_hours, max);
            config.validate(&[Requirement::Tracker, Requirement::IssueSource])?;
            let source = Arc::new(SentryClient::from_config(&config.sentry)?);
            let tracker = Arc::new(GitHubTracker::connect(config).await?);

            let reconciler = Reconciler::new(
                tracker.clone(),
                tracker.clone(),
                ReconcilerSettings::from_config(config),
            );
            let dispatcher = ContextDispatcher::new(
                Orchestrator::new(provider_from_config(&config.remediation)),
                Some(tracker),
            );

            let mut settings = PipelineSettings::from_config(config);
            if let Some(branch) = target_branch {
                settings.target_branch = branch;
            }

            let summary = match Pipeline::new(source, reconciler, dispatcher, settings)
                .run(Utc::now())
                .await
            {
                Ok(summary) => summary,
                Err(error) => {
                    if let AgentFixError::RunAborted { dispatch, .. } = &error {
                        print_json(dispatch)?;
                    }
                    return Err(error.into());
                }
            };
            print_json(&summary)?;
            finish_batch(&summary.dispatch)
        }
    }
}

fn execute_config_command(config: &AgentFixConfig, action: ConfigCommands) -> Result<(), CliError> {
    match action {
        ConfigCommands::Check => {
            let problems: Vec<String> = config
                .problems(&Requirement::ALL)
                .iter()
                .map(|p| p.to_string())
                .collect();
            print_json(&serde_json::json!({
                "ok": problems.is_empty(),
                "problems": problems,
            }))?;
            config.validate(&Requirement::ALL)?;
            Ok(())
        }
        ConfigCommands::Show { format } => {
            let rendered = match format {
                ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(output_error)?,
                ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(output_error)?,
            };
            println!("{}", rendered.trim_end());
            Ok(())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Configuration with stage flags applied, so they are validated like
/// configured values and sized into the tracker token budget.
fn with_stage_overrides(
    config: &AgentFixConfig,
    cooldown_hours: Option<f64>,
    max_fixes: Option<usize>,
) -> AgentFixConfig {
    let mut config = config.clone();
    if let Some(hours) = cooldown_hours {
        config.reconciler.cooldown_hours = hours;
    }
    if let Some(max) = max_fixes {
        config.dispatch.max_fixes = max;
    }
    config
}

/// Tracker for dispatch-marker comments, when one can be reached.
async fn comment_tracker(config: &AgentFixConfig) -> Option<Arc<dyn IssueTracker>> {
    if let Err(e) = config.validate(&[Requirement::Tracker]) {
        warn!(error = %e, "Dispatch results will not be recorded on tracked issues");
        return None;
    }
    match GitHubTracker::connect(config).await {
        Ok(tracker) => Some(Arc::new(tracker)),
        Err(e) => {
            warn!(error = %e, "Dispatch results will not be recorded on tracked issues");
            None
        }
    }
}

fn finish_batch(summary: &BatchSummary) -> Result<(), CliError> {
    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::ItemsFailed {
            failures: summary.failures,
        })
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).map_err(output_error)?;
    println!("{}", rendered);
    Ok(())
}

fn output_error(error: impl std::fmt::Display) -> CliError {
    CliError::Output {
        message: error.to_string(),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
