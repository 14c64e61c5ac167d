//! Tokenizer Module - 모델별 토큰 계산
//!
//! 모델마다 다른 토크나이저를 추상화하고, 프롬프트를 토큰 예산 안으로 맞춘다.
//!
//! ## 지원 토크나이저
//!
//! | 모델 | 토크나이저 | 라이브러리 |
//! |------|-----------|-----------|
//! | gpt-4o, o1, o3, o4 | o200k_base (BPE) | tiktoken-rs (`tiktoken` feature) |
//! | gpt-3.5, gpt-4 | cl100k_base (BPE) | tiktoken-rs (`tiktoken` feature) |
//! | 그 외 | 단어 수 × 1.3 | 내장 |
//!
//! ## 사용법
//!
//! ```ignore
//! use wayfarer_foundation::tokenizer::{TokenBudgeter, TokenizerFactory};
//!
//! let budgeter = TokenBudgeter::new(TokenizerFactory::for_model("gpt-3.5-turbo"));
//! let tokens = budgeter.estimate_tokens("Plan three days in Kyoto");
//! let user = budgeter.shape_to_fit(system_prompt, &long_itinerary, 4000);
//! ```

mod budget;
mod estimator;
mod factory;
mod traits;
mod types;

pub use budget::{
    TokenBudgeter, DEFAULT_MAX_TOTAL_TOKENS, DEFAULT_TRUNCATION_MARGIN, TRUNCATION_NOTICE,
};
#[cfg(feature = "tiktoken")]
pub use estimator::TiktokenTokenizer;
pub use estimator::{WordEstimateTokenizer, TOKENS_PER_WORD};
pub use factory::{estimate_tokens, TokenizerFactory};
pub use traits::Tokenizer;
pub use types::{TokenCount, TokenizerError, TokenizerType};
