//! # wayfarer-provider
//!
//! Remote text-generation boundary for Wayfarer.
//!
//! ## Features
//! - `RequestSpec`: 핑거프린트와 원격 호출의 공통 입력
//! - `Provider` trait: 한 번의 non-streaming 호출
//! - OpenAI-compatible HTTP provider
//! - Exponential backoff retry (`Always` / `Classified` policy)

pub mod error;
pub mod message;
pub mod providers;
pub mod request;
pub mod retry;
pub mod r#trait;

// Core traits and types
pub use message::{Message, MessageRole};
pub use r#trait::Provider;
pub use request::RequestSpec;

// Error and retry
pub use error::ProviderError;
pub use retry::{
    with_retry, RetryClassification, RetryConfig, RetryError, RetryEvent, RetryPolicy, RetryState,
    RetryableError,
};

// Provider implementations
pub use providers::openai::OpenAiProvider;
