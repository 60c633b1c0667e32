pub mod ask;
pub mod chat;
pub mod history;
pub mod repos;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use scout_core::config::Config;
use scout_core::history::HistoryStore;
use scout_core::ErrorKind;
use scout_integrations::github::GitHubDataSource;
use scout_intelligence::{
    AgentError, EngineConfig, ModelPricing, OpenAiProvider, RepoAssistant, UsageTracker,
};
use scout_telemetry::LogFormat;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    };
    config.context("failed to load configuration")
}

pub fn init_logging(config: &Config) {
    let format = config.general.log_format.parse().unwrap_or(LogFormat::Text);
    scout_telemetry::logging::init(format, "scout", &config.general.log_level);
}

pub fn history_store(config: &Config) -> HistoryStore {
    HistoryStore::new(&config.history.dir)
}

pub fn github_token(config: &Config) -> anyhow::Result<String> {
    config.github_token().with_context(|| {
        format!(
            "No GitHub token found. Set {} to a personal access token.",
            config.github.token_env
        )
    })
}

pub fn build_assistant(config: &Config) -> anyhow::Result<RepoAssistant> {
    let provider = OpenAiProvider::from_config(config).map_err(|e| {
        anyhow::anyhow!(
            "{e}\n  (hint: export {} with your model API key)",
            config.provider.api_key_env
        )
    })?;
    Ok(RepoAssistant::new(
        Arc::new(provider),
        Arc::new(GitHubDataSource::new()),
        history_store(config),
    )
    .with_engine_config(EngineConfig::from_config(config)))
}

/// Map an agent error to a message that says what the user can do about it.
pub fn friendly_error(err: AgentError) -> anyhow::Error {
    match err.kind() {
        ErrorKind::Authentication => {
            anyhow::anyhow!("Authentication failed: {err}\n  (hint: check your GitHub and model API tokens)")
        }
        ErrorKind::NotFound => anyhow::anyhow!("Not found: {err}"),
        ErrorKind::Transient => {
            anyhow::anyhow!("Temporary failure: {err}\n  (hint: try the question again)")
        }
        ErrorKind::Validation | ErrorKind::Internal => anyhow::anyhow!("{err}"),
    }
}

pub fn pricing(config: &Config) -> ModelPricing {
    ModelPricing::for_model(&config.provider.model).unwrap_or_default()
}

/// Share of the context window above which the usage report warns.
const CONTEXT_WARN_FRACTION: f64 = 0.7;

pub fn print_usage(usage: &UsageTracker, pricing: &ModelPricing) {
    for line in usage_report(usage, pricing) {
        eprintln!("{line}");
    }
}

fn usage_report(usage: &UsageTracker, pricing: &ModelPricing) -> Vec<String> {
    let mut lines = vec![
        format!(
            "tokens: {} request / {} response / {} total over {} requests (avg {:.0})",
            usage.request_tokens,
            usage.response_tokens,
            usage.total_tokens(),
            usage.requests,
            usage.average_tokens_per_request(),
        ),
        format!(
            "est. cost: ${:.4} (input ${:.4} / output ${:.4}, {})",
            usage.estimated_cost(pricing),
            pricing.input_cost(usage.request_tokens),
            pricing.output_cost(usage.response_tokens),
            pricing.model,
        ),
    ];
    let fraction = usage.context_fraction(pricing);
    if fraction > CONTEXT_WARN_FRACTION {
        lines.push(format!(
            "warning: {} tokens used, {:.0}% of the {} token context window for {}; consider clearing the history",
            usage.total_tokens(),
            fraction * 100.0,
            pricing.context_window,
            pricing.model,
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::data_source::DataSourceError;

    #[test]
    fn missing_model_key_is_reported_with_hint() {
        let mut config = Config::default();
        config.provider.api_key_env = "SCOUT_CLI_TEST_UNSET_KEY".into();
        let err = build_assistant(&config).err().unwrap();
        assert!(err.to_string().contains("export SCOUT_CLI_TEST_UNSET_KEY"));
    }

    #[test]
    fn friendly_error_by_kind() {
        let err = friendly_error(AgentError::Source(DataSourceError::Unauthorized(
            "Bad credentials".into(),
        )));
        assert!(err.to_string().starts_with("Authentication failed"));
    }

    #[test]
    fn unknown_models_price_as_default() {
        let mut config = Config::default();
        config.provider.model = "local-llama".into();
        assert_eq!(pricing(&config), ModelPricing::default());
    }

    #[test]
    fn usage_report_splits_cost() {
        let usage = UsageTracker { request_tokens: 40_000, response_tokens: 2_000, requests: 4 };
        let lines = usage_report(&usage, &ModelPricing::gpt_4o());
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "tokens: 40000 request / 2000 response / 42000 total over 4 requests (avg 10500)"
        );
        assert_eq!(lines[1], "est. cost: $0.1200 (input $0.1000 / output $0.0200, gpt-4o)");
    }

    #[test]
    fn usage_report_warns_near_context_limit() {
        let pricing = ModelPricing::gpt_4o();
        let at_limit = UsageTracker { request_tokens: 89_600, response_tokens: 0, requests: 1 };
        assert_eq!(usage_report(&at_limit, &pricing).len(), 2);

        let over = UsageTracker { request_tokens: 85_000, response_tokens: 5_000, requests: 3 };
        let lines = usage_report(&over, &pricing);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("warning: 90000 tokens used, 70% of the 128000 token context window"));
    }
}
