//! Tokenizer Trait 정의

use super::types::{TokenCount, TokenizerType};

/// 토크나이저 트레이트
///
/// 정확한 BPE 구현과 추정 구현이 같은 인터페이스를 따른다.
/// 호출자는 이 트레이트에만 의존한다.
pub trait Tokenizer: Send + Sync {
    /// 토크나이저 타입
    fn tokenizer_type(&self) -> TokenizerType;

    /// 텍스트를 토큰 수로 계산
    fn count(&self, text: &str) -> TokenCount;

    /// 정확한 토큰 계산 지원 여부
    fn is_exact(&self) -> bool {
        false
    }

    /// 여러 텍스트의 토큰 수 합계
    fn count_many(&self, texts: &[&str]) -> TokenCount {
        let total = texts.iter().map(|t| self.count(t).total).sum();

        TokenCount {
            total,
            is_exact: self.is_exact(),
            tokenizer_type: self.tokenizer_type(),
        }
    }

    /// 텍스트가 토큰 제한을 초과하는지 확인
    fn exceeds_limit(&self, text: &str, max_tokens: usize) -> bool {
        self.count(text).total > max_tokens
    }
}
