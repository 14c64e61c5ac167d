//! 토크나이저 구현체들
//!
//! - WordEstimateTokenizer: 단어 수 × 1.3 추정 (항상 사용 가능)
//! - TiktokenTokenizer: OpenAI 모델용 정확한 BPE (`tiktoken` feature)

use super::traits::Tokenizer;
use super::types::{TokenCount, TokenizerType};

/// Average tokens per whitespace-separated word
pub const TOKENS_PER_WORD: f64 = 1.3;

// ============================================================================
// 단어 기반 추정 토크나이저
// ============================================================================

/// Word-count approximation (fallback, never unavailable)
#[derive(Debug, Clone, Copy, Default)]
pub struct WordEstimateTokenizer;

impl WordEstimateTokenizer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn estimate_tokens(text: &str) -> usize {
        let words = text.split_whitespace().count();
        if words == 0 {
            return 0;
        }
        (words as f64 * TOKENS_PER_WORD).ceil() as usize
    }
}

impl Tokenizer for WordEstimateTokenizer {
    fn tokenizer_type(&self) -> TokenizerType {
        TokenizerType::WordEstimate
    }

    fn count(&self, text: &str) -> TokenCount {
        TokenCount::estimated(Self::estimate_tokens(text), TokenizerType::WordEstimate)
    }
}

// ============================================================================
// Tiktoken (OpenAI)
// ============================================================================

/// OpenAI tiktoken 기반 토크나이저
#[cfg(feature = "tiktoken")]
pub struct TiktokenTokenizer {
    tokenizer_type: TokenizerType,
    encoder: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenTokenizer {
    /// Load the BPE ranks for `tokenizer_type`
    pub fn new(tokenizer_type: TokenizerType) -> Result<Self, super::TokenizerError> {
        use super::TokenizerError;

        let encoder = match tokenizer_type {
            TokenizerType::TiktokenCl100k => tiktoken_rs::cl100k_base(),
            TokenizerType::TiktokenO200k => tiktoken_rs::o200k_base(),
            TokenizerType::WordEstimate => {
                return Err(TokenizerError::NotAvailable(
                    "word estimate has no BPE encoding".to_string(),
                ))
            }
        }
        .map_err(|e| TokenizerError::EncodingFailed(e.to_string()))?;

        Ok(Self {
            tokenizer_type,
            encoder,
        })
    }
}

#[cfg(feature = "tiktoken")]
impl Tokenizer for TiktokenTokenizer {
    fn tokenizer_type(&self) -> TokenizerType {
        self.tokenizer_type
    }

    fn count(&self, text: &str) -> TokenCount {
        TokenCount::exact(self.encoder.encode_ordinary(text).len(), self.tokenizer_type)
    }

    fn is_exact(&self) -> bool {
        true
    }
}
