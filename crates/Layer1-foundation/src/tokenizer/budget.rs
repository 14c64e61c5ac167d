//! Token Budget - 프롬프트를 토큰 예산 안으로 줄이기
//!
//! 시스템 프롬프트는 건드리지 않고 사용자 프롬프트의 앞부분만 남긴다.
//! 잘린 프롬프트 끝에는 [`TRUNCATION_NOTICE`]가 붙는다.

use super::factory::TokenizerFactory;
use super::traits::Tokenizer;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Appended to every shortened user prompt
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Note: The original prompt was truncated to fit within token limits.]";

/// 기본 총 토큰 예산
pub const DEFAULT_MAX_TOTAL_TOKENS: usize = 4000;

/// 비율 계산 후 추가로 빼는 단어 수
pub const DEFAULT_TRUNCATION_MARGIN: usize = 20;

/// 토큰 예산 관리자
#[derive(Clone)]
pub struct TokenBudgeter {
    tokenizer: Arc<dyn Tokenizer>,
    margin: usize,
}

impl std::fmt::Debug for TokenBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBudgeter")
            .field("tokenizer", &self.tokenizer.tokenizer_type())
            .field("margin", &self.margin)
            .finish()
    }
}

impl TokenBudgeter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            margin: DEFAULT_TRUNCATION_MARGIN,
        }
    }

    /// 모델에 맞는 토크나이저로 생성
    pub fn for_model(model_id: &str) -> Self {
        Self::new(TokenizerFactory::for_model(model_id))
    }

    pub fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    /// 텍스트 토큰 수 추정
    pub fn estimate_tokens(&self, text: &str) -> usize {
        self.tokenizer.count(text).total
    }

    /// 두 프롬프트 합계가 예산 안인지
    pub fn fits(&self, system_prompt: &str, user_prompt: &str, max_total_tokens: usize) -> bool {
        self.estimate_tokens(system_prompt) + self.estimate_tokens(user_prompt) <= max_total_tokens
    }

    /// 사용자 프롬프트를 예산 안으로 줄인다.
    ///
    /// 예산 안이면 `Cow::Borrowed`로 그대로 돌려주고,
    /// 줄였으면 `Cow::Owned`에 앞부분 단어들과 [`TRUNCATION_NOTICE`]를 담는다.
    ///
    /// 남길 단어 수는 `floor(words * available / user_tokens) - margin`.
    /// 정확한 토크나이저가 그 결과를 여전히 초과로 세면 단어를 더 뺀다.
    /// 예산이 시스템 프롬프트와 안내문조차 담지 못하면 안내문만 남는다.
    pub fn shape_to_fit<'a>(
        &self,
        system_prompt: &str,
        user_prompt: &'a str,
        max_total_tokens: usize,
    ) -> Cow<'a, str> {
        let user_tokens = self.estimate_tokens(user_prompt);
        if user_tokens == 0 {
            return Cow::Borrowed(user_prompt);
        }

        let system_tokens = self.estimate_tokens(system_prompt);
        if system_tokens + user_tokens <= max_total_tokens {
            return Cow::Borrowed(user_prompt);
        }

        let available = max_total_tokens.saturating_sub(system_tokens);
        let words: Vec<&str> = user_prompt.split_whitespace().collect();
        let ratio = available as f64 / user_tokens as f64;
        let mut keep = ((words.len() as f64 * ratio).floor() as usize)
            .saturating_sub(self.margin)
            .min(words.len());

        loop {
            let shaped = Self::assemble(&words[..keep]);
            let shaped_tokens = self.estimate_tokens(&shaped);
            if shaped_tokens <= available || keep == 0 {
                debug!(
                    original_words = words.len(),
                    kept_words = keep,
                    original_tokens = user_tokens,
                    shaped_tokens,
                    available,
                    "Shaped user prompt"
                );
                return Cow::Owned(shaped);
            }
            let over = shaped_tokens - available;
            keep = keep.saturating_sub(over.max(1));
        }
    }

    fn assemble(words: &[&str]) -> String {
        if words.is_empty() {
            return TRUNCATION_NOTICE.trim_start().to_string();
        }
        let mut shaped = words.join(" ");
        shaped.push_str(TRUNCATION_NOTICE);
        shaped
    }
}

impl Default for TokenBudgeter {
    fn default() -> Self {
        Self::new(TokenizerFactory::approximate())
    }
}
