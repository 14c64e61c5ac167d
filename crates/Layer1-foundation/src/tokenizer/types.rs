//! Tokenizer 타입 정의

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 토크나이저 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerType {
    /// OpenAI tiktoken (cl100k_base - GPT-4, GPT-3.5)
    TiktokenCl100k,
    /// OpenAI tiktoken (o200k_base - GPT-4o, o1, o3)
    TiktokenO200k,
    /// 단어 수 기반 추정
    #[default]
    WordEstimate,
}

impl TokenizerType {
    /// tiktoken 인코딩 이름
    pub fn encoding_name(&self) -> Option<&'static str> {
        match self {
            Self::TiktokenCl100k => Some("cl100k_base"),
            Self::TiktokenO200k => Some("o200k_base"),
            Self::WordEstimate => None,
        }
    }
}

/// 토큰 수 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    /// 총 토큰 수
    pub total: usize,
    /// 정확한 계산 여부 (false면 추정치)
    pub is_exact: bool,
    /// 사용된 토크나이저 타입
    pub tokenizer_type: TokenizerType,
}

impl TokenCount {
    pub fn exact(total: usize, tokenizer_type: TokenizerType) -> Self {
        Self {
            total,
            is_exact: true,
            tokenizer_type,
        }
    }

    pub fn estimated(total: usize, tokenizer_type: TokenizerType) -> Self {
        Self {
            total,
            is_exact: false,
            tokenizer_type,
        }
    }
}

/// 토크나이저 에러
#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Tokenizer not available: {0}")]
    NotAvailable(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}
