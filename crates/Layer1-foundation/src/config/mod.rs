//! Config - 통합 설정 관리
//!
//! - `wayfarer.rs` - WayfarerConfig 통합 설정 (provider, cache, budget, retry)

mod wayfarer;

pub use wayfarer::{
    BudgetSettings, CacheSettings, ConfigLayer, ProviderSettings, RetrySettings, WayfarerConfig, ENV_API_KEY,
    ENV_BASE_URL, ENV_DATA_DIR, ENV_MODEL, WAYFARER_CONFIG_FILE,
};
