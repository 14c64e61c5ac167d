//! # wayfarer-foundation
//!
//! Foundation layer for Wayfarer:
//! - Cache: 요청 핑거프린트 + 2단 응답 캐시 (SQLite 기본, 파일 대체)
//! - Tokenizer: 토큰 추정 및 프롬프트 예산 맞추기
//! - Config: 통합 설정 (WayfarerConfig)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  WayfarerConfig (global → project → env)                │
//! │          │                      │                       │
//! │          ▼                      ▼                       │
//! │   ResponseCache           TokenBudgeter                 │
//! │   ├── SqliteCacheStore    ├── TiktokenTokenizer         │
//! │   └── FileCacheStore      └── WordEstimateTokenizer     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tokenizer;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{
    BudgetSettings, CacheSettings, ConfigLayer, ProviderSettings, RetrySettings, WayfarerConfig,
    ENV_API_KEY, ENV_BASE_URL, ENV_DATA_DIR, ENV_MODEL, WAYFARER_CONFIG_FILE,
};

// ============================================================================
// Cache (응답 캐시)
// ============================================================================
pub use cache::{
    // Fingerprint
    canonical_json,
    fingerprint,
    fingerprint_value,
    CacheKey,
    // Stores
    CacheEntry,
    CacheStore,
    FileCacheStore,
    SqliteCacheStore,
    StoredPayload,
    UnavailableStore,
    // Facade
    CacheStats,
    ResponseCache,
    SweepReport,
};

// ============================================================================
// Tokenizer (토큰 계산)
// ============================================================================
pub use tokenizer::{
    estimate_tokens, TokenBudgeter, TokenCount, Tokenizer, TokenizerError, TokenizerFactory,
    TokenizerType, WordEstimateTokenizer, TRUNCATION_NOTICE,
};
