//! Implementation of the benchmark run command.

use anyhow::{Context, Result};
use clap::CommandFactory;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::adapters::oracle::HttpOracle;
use crate::adapters::providers::build_provider;
use crate::adapters::sqlite::{initialize_database, SqliteRunRepository};
use crate::cli::display::render_catalog;
use crate::cli::output::{render_failure, render_summary};
use crate::cli::types::Cli;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, RunTarget};
use crate::domain::ports::Oracle;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::{CompletionDispatcher, RetryPolicy, RunOrchestrator, RunOutcome, RunRequest};

/// Argument that prints the problem-set catalog instead of running.
pub const LIST_ARGUMENT: &str = "list";

pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let Some(arg) = cli.arg.as_deref() else {
        let _ = Cli::command().print_help();
        println!("\n\nTip: Use '{LIST_ARGUMENT}' as the argument to see available problem sets.");
        return Ok(ExitCode::FAILURE);
    };

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let oracle = Arc::new(
        HttpOracle::new(&config.base_url, Duration::from_secs(config.oracle_timeout_secs))
            .context("Failed to create oracle client")?,
    );

    if arg == LIST_ARGUMENT {
        let catalog = oracle
            .problem_sets()
            .await
            .context("Failed to fetch problem sets")?;
        println!("{}", render_catalog(&catalog));
        return Ok(ExitCode::SUCCESS);
    }

    let target = RunTarget::parse(arg)?;
    if cli.resume.is_some() && target.run_id().is_none() {
        eprintln!("--resume requires the id of an existing run, got '{arg}'");
        return Ok(ExitCode::FAILURE);
    }

    let pool = initialize_database(&config.database)
        .await
        .context("Failed to initialize database")?;
    let repository = Arc::new(SqliteRunRepository::new(pool));

    let request = RunRequest {
        provider: cli.provider.clone(),
        target,
        attempts_per_problem: cli.attempts_per_problem,
        resume: cli.resume.map(Into::into),
    };
    info!(provider = %request.provider, target = ?request.target, "Starting benchmark");

    let mut orchestrator = RunOrchestrator::new(oracle, repository, config);
    let outcome = orchestrator
        .run(&request, |config| build_dispatcher(&request.provider, config))
        .await;

    match outcome {
        Ok(RunOutcome::Completed(summary)) => {
            println!("{}", render_summary(&summary));
            Ok(ExitCode::SUCCESS)
        }
        Ok(RunOutcome::Failed { run_id, snapshot }) => {
            println!("{}", render_failure(&request.provider, run_id, &snapshot));
            Ok(ExitCode::FAILURE)
        }
        Err(DomainError::ResumeResetFailed(attempt_id)) => {
            println!("\n### SYSTEM ERROR: Failed to reset attempt {attempt_id}, exiting.");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).context("Benchmark run could not be started"),
    }
}

/// Provider adapter and dispatcher for the effective configuration.
fn build_dispatcher(provider: &str, config: &Config) -> DomainResult<CompletionDispatcher> {
    let provider_config = config
        .provider(provider)
        .ok_or_else(|| DomainError::Configuration(format!("no settings for provider '{provider}'")))?;
    let model_provider = build_provider(provider, provider_config, config.api_key(provider))?;

    Ok(CompletionDispatcher::from_config(
        model_provider,
        provider_config,
        RetryPolicy::from_config(&config.retry),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dispatcher_requires_key() {
        let config = Config::default();
        temp_env::with_var_unset("OPENAI_API_KEY", || {
            let err = build_dispatcher("openai", &config).err().unwrap();
            assert!(matches!(err, DomainError::Configuration(_)));
        });
    }

    #[test]
    fn test_build_dispatcher_with_credentials() {
        let mut config = Config::default();
        config.api_keys.insert("anthropic".to_string(), "sk-ant".to_string());
        config.providers.get_mut("anthropic").unwrap().rate_limit_secs = 2.0;

        let dispatcher = build_dispatcher("anthropic", &config).unwrap();
        assert_eq!(dispatcher.provider().name(), "anthropic");
        assert_eq!(dispatcher.total_call_count(), 0);
    }
}
