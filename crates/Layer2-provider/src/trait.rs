//! Provider trait - 원격 텍스트 생성 호출 경계

use crate::error::ProviderError;
use crate::request::RequestSpec;
use async_trait::async_trait;

/// Remote text-generation service
///
/// 구현체는 한 번의 호출만 책임진다. 재시도와 캐시는 상위 계층의 몫이다.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier for logs (e.g., "openai")
    fn name(&self) -> &str;

    /// Perform one non-streaming completion and return the generated text
    async fn complete(&self, request: &RequestSpec) -> Result<String, ProviderError>;

    /// Check if the provider has what it needs to make calls
    fn is_available(&self) -> bool {
        true
    }
}
