//! Subcommand implementations

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wayfarer_foundation::cache::{
    canonical_json, fingerprint_value, FileCacheStore, ResponseCache, SqliteCacheStore,
};
use wayfarer_foundation::WayfarerConfig;
use wayfarer_invoker::{InvocationError, Invoker};
use wayfarer_provider::{OpenAiProvider, ProviderError, RequestSpec};

/// Command-line overrides, applied after files and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Arguments shared by `ask` and `ask-json`
#[derive(Debug)]
pub struct AskRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub class: String,
    pub ttl: Option<u64>,
    pub quiet: bool,
}

/// Load configuration (global → project → env → flags)
pub fn load_config(overrides: &Overrides) -> WayfarerConfig {
    let mut config = WayfarerConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let mut config = WayfarerConfig::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    });

    if let Some(model) = &overrides.model {
        config.provider.model = model.clone();
    }
    if let Some(api_key) = &overrides.api_key {
        config.provider.api_key = Some(api_key.clone());
    }
    if let Some(base_url) = &overrides.base_url {
        config.provider.base_url = Some(base_url.clone());
    }
    if let Some(data_dir) = &overrides.data_dir {
        config.cache.data_dir = Some(data_dir.clone());
    }

    config
}

fn build_invoker(config: &WayfarerConfig, quiet: bool) -> anyhow::Result<Invoker> {
    let provider = OpenAiProvider::from_settings(&config.provider)
        .context("Provider is not configured (set OPENAI_API_KEY or pass --api-key)")?;

    let mut builder = Invoker::configure(Arc::new(provider), config);
    if !quiet {
        builder = builder.on_progress(|msg| eprintln!("{}", msg));
    }

    Ok(builder.build())
}

fn build_spec(config: &WayfarerConfig, request: &AskRequest) -> RequestSpec {
    let mut spec = RequestSpec::from_settings(&config.provider);
    if let Some(system) = &request.system {
        spec = spec.system(system.clone());
    }
    spec.user(request.prompt.clone())
}

/// Turn an invocation failure into a user-facing error
fn explain(err: InvocationError) -> anyhow::Error {
    if let Some(attempts) = err.attempts() {
        debug!(attempts, error = %err, "Remote call gave up");
    }

    let hint = match err.provider_error() {
        Some(ProviderError::Authentication(_)) => {
            Some("Check OPENAI_API_KEY or pass --api-key")
        }
        Some(ProviderError::ContextLengthExceeded(_)) => {
            Some("Lower budget.maxTotalTokens in config.json")
        }
        Some(ProviderError::Network(_)) => Some("Check --base-url and network access"),
        _ => None,
    };

    match hint {
        Some(hint) => anyhow::Error::new(err).context(hint),
        None => err.into(),
    }
}

fn ttl_for(invoker: &Invoker, request: &AskRequest) -> Duration {
    request
        .ttl
        .map(Duration::from_secs)
        .unwrap_or_else(|| invoker.default_ttl())
}

/// `wayfarer ask`
pub async fn ask(config: &WayfarerConfig, request: &AskRequest) -> anyhow::Result<()> {
    let invoker = build_invoker(config, request.quiet)?;
    let spec = build_spec(config, request);

    let text = invoker
        .invoke(&request.class, &spec, ttl_for(&invoker, request))
        .await
        .map_err(explain)?;
    println!("{}", text);

    debug!(stats = ?invoker.cache_stats(), "Cache statistics");
    Ok(())
}

/// `wayfarer ask-json`
pub async fn ask_json(config: &WayfarerConfig, request: &AskRequest) -> anyhow::Result<()> {
    let invoker = build_invoker(config, request.quiet)?;
    let spec = build_spec(config, request);

    let value: serde_json::Value = invoker
        .invoke_json(&request.class, &spec, ttl_for(&invoker, request))
        .await
        .map_err(explain)?;
    println!("{}", serde_json::to_string_pretty(&value)?);

    debug!(stats = ?invoker.cache_stats(), "Cache statistics");
    Ok(())
}

/// `wayfarer fingerprint`
pub fn fingerprint(class: &str, request: &str) -> anyhow::Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(request).context("Request must be valid JSON")?;

    println!("{}", fingerprint_value(class, &value));
    println!("{}", canonical_json(&value));
    Ok(())
}

/// `wayfarer sweep`
pub fn sweep(config: &WayfarerConfig) -> anyhow::Result<()> {
    let report = ResponseCache::open(&config.cache).sweep();

    println!(
        "Removed {} expired entries ({} database, {} fallback files)",
        report.total(),
        report.durable_removed,
        report.fallback_removed
    );
    Ok(())
}

/// `wayfarer stats`
pub fn stats(config: &WayfarerConfig) -> anyhow::Result<()> {
    let db_path = config.cache.database_path();
    let fallback = FileCacheStore::new(config.cache.fallback_path());

    println!("Database:  {}", db_path.display());
    match SqliteCacheStore::open(&db_path).and_then(|store| store.len()) {
        Ok(n) => println!("  entries: {}", n),
        Err(e) => println!("  unavailable: {}", e),
    }

    println!("Fallback:  {}", fallback.dir().display());
    println!("  files:   {}", fallback.len()?);

    println!("Model:     {}", config.provider.model);
    println!(
        "Budget:    {} tokens, {} attempts",
        config.budget.max_total_tokens, config.retry.max_attempts
    );
    Ok(())
}
