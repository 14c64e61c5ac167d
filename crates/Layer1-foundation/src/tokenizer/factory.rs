//! Tokenizer Factory - 모델별 토크나이저 선택
//!
//! 선택은 시작 시 한 번. 정확한 토크나이저를 만들 수 없으면 항상 추정으로 대체한다.

use super::estimator::WordEstimateTokenizer;
use super::traits::Tokenizer;
use super::types::TokenizerType;
use std::sync::Arc;
use tracing::debug;

/// 토크나이저 팩토리
pub struct TokenizerFactory;

impl TokenizerFactory {
    /// 모델 ID로 토크나이저 선택
    pub fn for_model(model_id: &str) -> Arc<dyn Tokenizer> {
        let preferred = Self::tokenizer_type_for(model_id);
        let tokenizer = Self::create(preferred);
        debug!(
            model = model_id,
            tokenizer = ?tokenizer.tokenizer_type(),
            encoding = tokenizer.tokenizer_type().encoding_name().unwrap_or("none"),
            exact = tokenizer.is_exact(),
            "Selected tokenizer"
        );
        tokenizer
    }

    /// 추정 토크나이저 (항상 사용 가능)
    pub fn approximate() -> Arc<dyn Tokenizer> {
        Arc::new(WordEstimateTokenizer::new())
    }

    /// 모델 ID 패턴으로 토크나이저 타입 추론
    pub fn tokenizer_type_for(model_id: &str) -> TokenizerType {
        let model_lower = model_id.to_lowercase();

        if model_lower.contains("gpt-4o")
            || model_lower.starts_with("o1")
            || model_lower.starts_with("o3")
            || model_lower.starts_with("o4")
        {
            TokenizerType::TiktokenO200k
        } else if model_lower.contains("gpt") {
            TokenizerType::TiktokenCl100k
        } else {
            TokenizerType::WordEstimate
        }
    }

    #[cfg(feature = "tiktoken")]
    fn create(tokenizer_type: TokenizerType) -> Arc<dyn Tokenizer> {
        use super::estimator::TiktokenTokenizer;

        if tokenizer_type == TokenizerType::WordEstimate {
            return Self::approximate();
        }
        match TiktokenTokenizer::new(tokenizer_type) {
            Ok(tokenizer) => Arc::new(tokenizer),
            Err(e) => {
                tracing::warn!(
                    encoding = tokenizer_type.encoding_name().unwrap_or("none"),
                    error = %e,
                    "Exact tokenizer unavailable, falling back to estimate"
                );
                Self::approximate()
            }
        }
    }

    #[cfg(not(feature = "tiktoken"))]
    fn create(tokenizer_type: TokenizerType) -> Arc<dyn Tokenizer> {
        if let Some(encoding) = tokenizer_type.encoding_name() {
            debug!(encoding, "Built without tiktoken, using word estimate");
        }
        Self::approximate()
    }
}

/// 모델 기준 토큰 수 추정
pub fn estimate_tokens(text: &str, model_id: &str) -> usize {
    TokenizerFactory::for_model(model_id).count(text).total
}
