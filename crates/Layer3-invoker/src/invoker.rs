//! Resilient Invoker
//!
//! ```text
//! CHECK_CACHE ─ hit ──────────────────────────────────────▶ return
//!      │ miss
//!      ▼
//!    SHAPE ─▶ CALL ─ success ─▶ CACHE_WRITE ──────────────▶ return
//!              ▲  │
//!              │  ├ retriable failure ─▶ BACKOFF ─┐
//!              └──┼──────────────────────────────┘
//!                 └ final failure ────────────────────────▶ error
//! ```
//!
//! 캐시 키는 축소 전 요청으로 계산한다. 같은 요청은 축소 여부와 관계없이 같은 항목을 쓴다.

use crate::error::InvocationError;
use crate::progress::{ProgressCallback, ProgressNotice, ProgressReporter};
use crate::structured;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wayfarer_foundation::cache::{CacheStats, ResponseCache, SweepReport};
use wayfarer_foundation::tokenizer::{TokenBudgeter, DEFAULT_MAX_TOTAL_TOKENS};
use wayfarer_foundation::WayfarerConfig;
use wayfarer_provider::{
    with_retry, Provider, ProviderError, RequestSpec, RetryConfig, RetryEvent,
};

/// Request class for raw chat completions
pub const CHAT_REQUEST_CLASS: &str = "chat";

/// Cache lookup, prompt shaping, retried remote call and write-back
///
/// `Send + Sync`; share it across tasks with `Arc`.
pub struct Invoker {
    provider: Arc<dyn Provider>,
    cache: Arc<ResponseCache>,
    budgeter: TokenBudgeter,
    max_total_tokens: usize,
    retry: RetryConfig,
    default_ttl: Duration,
    progress: ProgressReporter,
}

impl Invoker {
    pub fn builder(provider: Arc<dyn Provider>, cache: Arc<ResponseCache>) -> InvokerBuilder {
        InvokerBuilder::new(provider, cache)
    }

    /// Builder wired from configuration
    ///
    /// The tokenizer is chosen once here, from the configured model.
    pub fn configure(provider: Arc<dyn Provider>, config: &WayfarerConfig) -> InvokerBuilder {
        let cache = Arc::new(ResponseCache::open(&config.cache));
        let budgeter = TokenBudgeter::for_model(&config.provider.model)
            .with_margin(config.budget.truncation_margin);

        Self::builder(provider, cache)
            .budgeter(budgeter)
            .max_total_tokens(config.budget.max_total_tokens)
            .retry(RetryConfig::from(&config.retry))
            .default_ttl(config.cache.default_ttl())
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &WayfarerConfig) -> Self {
        Self::configure(provider, config).build()
    }

    /// Return the text for `spec`, from cache or from the remote service
    pub async fn invoke(
        &self,
        request_class: &str,
        spec: &RequestSpec,
        ttl: Duration,
    ) -> Result<String, InvocationError> {
        self.progress.report(&ProgressNotice::Preparing);

        if let Some(text) = self.cache.get_as::<String, _>(request_class, spec) {
            self.progress.report(&ProgressNotice::CacheHit);
            debug!(request_class, "Served from cache");
            return Ok(text);
        }

        let shaped = self.shape(spec);

        self.progress.report(&ProgressNotice::Calling);
        let progress = &self.progress;
        let request = shaped.as_ref();
        let text = with_retry(
            &self.retry,
            self.provider.name(),
            |event: RetryEvent<'_, ProviderError>| match event {
                RetryEvent::Retrying {
                    attempt,
                    max_attempts,
                } => progress.report(&ProgressNotice::Retrying {
                    attempt,
                    max_attempts,
                }),
                RetryEvent::Failed { error, .. } => {
                    progress.report(&ProgressNotice::Failed(error.to_string()))
                }
            },
            || self.provider.complete(request),
        )
        .await?;

        self.progress.report(&ProgressNotice::Succeeded);
        self.cache.put(request_class, spec, &text, ttl);
        info!(
            request_class,
            provider = self.provider.name(),
            chars = text.len(),
            "Remote call succeeded"
        );

        Ok(text)
    }

    /// Return the JSON document in the response, deserialized
    ///
    /// The parsed value is cached under `request_class`, and the raw text under
    /// [`CHAT_REQUEST_CLASS`]. `request_class` may not be [`CHAT_REQUEST_CLASS`]
    /// itself, since the parsed value would replace the raw text.
    pub async fn invoke_json<T>(
        &self,
        request_class: &str,
        spec: &RequestSpec,
        ttl: Duration,
    ) -> Result<T, InvocationError>
    where
        T: DeserializeOwned + Serialize,
    {
        if request_class == CHAT_REQUEST_CLASS {
            return Err(InvocationError::ReservedClass(request_class.to_string()));
        }

        if let Some(parsed) = self.cache.get_as::<T, _>(request_class, spec) {
            self.progress.report(&ProgressNotice::CacheHit);
            debug!(request_class, "Served parsed value from cache");
            return Ok(parsed);
        }

        let text = self.invoke(CHAT_REQUEST_CLASS, spec, ttl).await?;
        let parsed: T = structured::parse_json(&text).map_err(|e| {
            InvocationError::MalformedResponse(format!("expected JSON document: {}", e))
        })?;

        self.cache.put(request_class, spec, &parsed, ttl);
        Ok(parsed)
    }

    /// Physically delete expired cache entries
    pub fn sweep(&self) -> SweepReport {
        self.cache.sweep()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Shrink the last user message; every other message counts as system-side cost
    fn shape<'a>(&self, spec: &'a RequestSpec) -> Cow<'a, RequestSpec> {
        let Some(index) = spec.last_user_index() else {
            return Cow::Borrowed(spec);
        };

        let context = spec.context_excluding(index);
        let user = &spec.messages[index].content;
        if self.budgeter.fits(&context, user, self.max_total_tokens) {
            return Cow::Borrowed(spec);
        }

        self.progress.report(&ProgressNotice::Optimizing);
        match self
            .budgeter
            .shape_to_fit(&context, user, self.max_total_tokens)
        {
            Cow::Borrowed(_) => Cow::Borrowed(spec),
            Cow::Owned(shaped) => Cow::Owned(spec.with_content_at(index, shaped)),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// [`Invoker`] builder
pub struct InvokerBuilder {
    provider: Arc<dyn Provider>,
    cache: Arc<ResponseCache>,
    budgeter: Option<TokenBudgeter>,
    max_total_tokens: usize,
    retry: RetryConfig,
    default_ttl: Duration,
    progress: ProgressReporter,
}

impl InvokerBuilder {
    fn new(provider: Arc<dyn Provider>, cache: Arc<ResponseCache>) -> Self {
        Self {
            provider,
            cache,
            budgeter: None,
            max_total_tokens: DEFAULT_MAX_TOTAL_TOKENS,
            retry: RetryConfig::default(),
            default_ttl: Duration::from_secs(24 * 60 * 60),
            progress: ProgressReporter::silent(),
        }
    }

    pub fn budgeter(mut self, budgeter: TokenBudgeter) -> Self {
        self.budgeter = Some(budgeter);
        self
    }

    pub fn max_total_tokens(mut self, max_total_tokens: usize) -> Self {
        self.max_total_tokens = max_total_tokens;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Receive progress notices as text
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Arc::new(callback);
        self.progress = ProgressReporter::new(callback);
        self
    }

    pub fn build(self) -> Invoker {
        Invoker {
            provider: self.provider,
            cache: self.cache,
            budgeter: self.budgeter.unwrap_or_default(),
            max_total_tokens: self.max_total_tokens,
            retry: self.retry,
            default_ttl: self.default_ttl,
            progress: self.progress,
        }
    }
}
