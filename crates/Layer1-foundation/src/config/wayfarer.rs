//! Wayfarer Config - 통합 설정
//!
//! 로드 순서 (뒤가 우선):
//! 1. 기본값
//! 2. 글로벌 설정 (`~/.config/wayfarer/config.json`)
//! 3. 프로젝트 설정 (`.wayfarer/config.json`)
//! 4. 환경 변수 (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `WAYFARER_MODEL`, `WAYFARER_DATA_DIR`)
//!
//! 파일에 없는 필드는 병합 시 이전 계층 값을 유지한다.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const WAYFARER_CONFIG_FILE: &str = "config.json";

/// 설정 디렉토리 이름
const APP_DIR: &str = "wayfarer";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "WAYFARER_MODEL";
pub const ENV_DATA_DIR: &str = "WAYFARER_DATA_DIR";

// ============================================================================
// Config Layer
// ============================================================================

/// 설정 파일 계층
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// `~/.config/wayfarer/`
    Global,
    /// `<cwd>/.wayfarer/`
    Project,
}

impl ConfigLayer {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Project => "project",
        }
    }

    /// 계층의 설정 디렉토리
    pub fn dir(&self) -> Result<PathBuf> {
        match self {
            Self::Global => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| Error::Config("Cannot find config directory".to_string())),
            Self::Project => std::env::current_dir()
                .map(|cwd| cwd.join(format!(".{}", APP_DIR)))
                .map_err(|e| Error::Config(format!("Cannot get current directory: {}", e))),
        }
    }
}

// ============================================================================
// Wayfarer Config (통합)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WayfarerConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub budget: BudgetSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl WayfarerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드, 환경 변수 적용
    pub fn load() -> Result<Self> {
        let global = ConfigLayer::Global.dir().ok();
        let project = ConfigLayer::Project.dir().ok();
        Self::load_layers(global.as_deref(), project.as_deref(), |name| {
            std::env::var(name).ok()
        })
    }

    /// 주어진 디렉토리들에서 계층 순서대로 로드
    ///
    /// 없는 디렉토리나 파일은 건너뛴다. 파싱 실패는 계층 이름과 함께 에러.
    pub fn load_layers<F>(global: Option<&Path>, project: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        let layers = [(ConfigLayer::Global, global), (ConfigLayer::Project, project)];
        for (layer, dir) in layers {
            let Some(dir) = dir else { continue };
            if let Some(layer_config) = Self::load_file(layer, &dir.join(WAYFARER_CONFIG_FILE))? {
                debug!(layer = layer.name(), dir = %dir.display(), "Loaded config");
                config.merge(layer_config);
            }
        }

        config.apply_env(lookup);
        Ok(config)
    }

    /// 설정 파일 하나 로드, 파일이 없으면 `None`
    pub fn load_file(layer: ConfigLayer, path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {} config {}: {}",
                    layer.name(),
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            Error::Config(format!(
                "Failed to parse {} config {}: {}",
                layer.name(),
                path.display(),
                e
            ))
        })
    }

    /// 환경 변수 오버라이드
    ///
    /// 변수는 `lookup`으로 읽는다 (보통 `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.provider.base_url = Some(url);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.provider.model = model;
        }
        if let Some(dir) = non_empty(ENV_DATA_DIR) {
            self.cache.data_dir = Some(PathBuf::from(dir));
        }
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: WayfarerConfig) {
        self.provider.merge(other.provider);
        self.cache.merge(other.cache);
        self.budget.merge(other.budget);
        self.retry.merge(other.retry);
    }
}

// ============================================================================
// Provider Settings
// ============================================================================

/// 원격 텍스트 생성 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// HTTP 요청 타임아웃 (초)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn merge(&mut self, other: ProviderSettings) {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.model != default_model() {
            self.model = other.model;
        }
        if other.temperature != default_temperature() {
            self.temperature = other.temperature;
        }
        if other.max_output_tokens != default_max_output_tokens() {
            self.max_output_tokens = other.max_output_tokens;
        }
        if other.timeout_secs != default_timeout_secs() {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

// ============================================================================
// Cache Settings
// ============================================================================

/// 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// 데이터 디렉토리 (없으면 플랫폼 데이터 디렉토리)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// SQLite 파일명 (data_dir 기준)
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// 폴백 파일 캐시 디렉토리명 (data_dir 기준)
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: String,

    /// 기본 TTL (초)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// 폴백 저장소 히트를 내구성 저장소로 승격 (없으면 true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promote_fallback_hits: Option<bool>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: default_database_file(),
            fallback_dir: default_fallback_dir(),
            default_ttl_secs: default_ttl_secs(),
            promote_fallback_hits: None,
        }
    }
}

impl CacheSettings {
    /// Effective data directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wayfarer")
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.database_file)
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.resolved_data_dir().join(&self.fallback_dir)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn promote_fallback_hits(&self) -> bool {
        self.promote_fallback_hits.unwrap_or(true)
    }

    fn merge(&mut self, other: CacheSettings) {
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.database_file != default_database_file() {
            self.database_file = other.database_file;
        }
        if other.fallback_dir != default_fallback_dir() {
            self.fallback_dir = other.fallback_dir;
        }
        if other.default_ttl_secs != default_ttl_secs() {
            self.default_ttl_secs = other.default_ttl_secs;
        }
        if other.promote_fallback_hits.is_some() {
            self.promote_fallback_hits = other.promote_fallback_hits;
        }
    }
}

// ============================================================================
// Budget Settings
// ============================================================================

/// 토큰 예산 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSettings {
    /// system + user 합산 최대 토큰
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: usize,

    /// 잘림 안내문을 위해 비워두는 단어 수
    #[serde(default = "default_truncation_margin")]
    pub truncation_margin: usize,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            max_total_tokens: default_max_total_tokens(),
            truncation_margin: default_truncation_margin(),
        }
    }
}

impl BudgetSettings {
    fn merge(&mut self, other: BudgetSettings) {
        if other.max_total_tokens != default_max_total_tokens() {
            self.max_total_tokens = other.max_total_tokens;
        }
        if other.truncation_margin != default_truncation_margin() {
            self.truncation_margin = other.truncation_margin;
        }
    }
}

// ============================================================================
// Retry Settings
// ============================================================================

/// 재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    /// 최대 시도 횟수 (첫 호출 포함)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// 지연에 ±20% 무작위 편차 (없으면 false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<bool>,

    /// 인증/검증 에러는 재시도하지 않음 (없으면 false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classify_errors: Option<bool>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: None,
            classify_errors: None,
        }
    }
}

impl RetrySettings {
    pub fn jitter(&self) -> bool {
        self.jitter.unwrap_or(false)
    }

    pub fn classify_errors(&self) -> bool {
        self.classify_errors.unwrap_or(false)
    }

    fn merge(&mut self, other: RetrySettings) {
        if other.max_attempts != default_max_attempts() {
            self.max_attempts = other.max_attempts;
        }
        if other.base_delay_ms != default_base_delay_ms() {
            self.base_delay_ms = other.base_delay_ms;
        }
        if other.max_delay_ms != default_max_delay_ms() {
            self.max_delay_ms = other.max_delay_ms;
        }
        if other.backoff_multiplier != default_backoff_multiplier() {
            self.backoff_multiplier = other.backoff_multiplier;
        }
        if other.jitter.is_some() {
            self.jitter = other.jitter;
        }
        if other.classify_errors.is_some() {
            self.classify_errors = other.classify_errors;
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    1000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_database_file() -> String {
    "wayfarer.db".to_string()
}

fn default_fallback_dir() -> String {
    "cache".to_string()
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_max_total_tokens() -> usize {
    4000
}

fn default_truncation_margin() -> usize {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WayfarerConfig::default();
        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.budget.max_total_tokens, 4000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(86_400));
        assert!(config.cache.promote_fallback_hits());
        assert!(!config.retry.classify_errors());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WayfarerConfig =
            serde_json::from_str(r#"{"retry": {"maxAttempts": 5}}"#).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.provider.temperature, 0.7);
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = WayfarerConfig::default();
        base.provider.model = "gpt-4o-mini".to_string();

        let mut project = WayfarerConfig::default();
        project.budget.max_total_tokens = 2000;
        project.provider.api_key = Some("sk-project".into());

        base.merge(project);
        assert_eq!(base.provider.model, "gpt-4o-mini");
        assert_eq!(base.budget.max_total_tokens, 2000);
        assert_eq!(base.provider.api_key.as_deref(), Some("sk-project"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-env"),
            (ENV_MODEL, "gpt-4o"),
            (ENV_DATA_DIR, "/var/lib/wayfarer"),
            (ENV_BASE_URL, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = WayfarerConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.provider.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.provider.model, "gpt-4o");
        assert!(config.provider.base_url.is_none());
        assert_eq!(
            config.cache.database_path(),
            PathBuf::from("/var/lib/wayfarer/wayfarer.db")
        );
    }

    fn write_config(dir: &Path, json: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(WAYFARER_CONFIG_FILE), json).unwrap();
    }

    #[test]
    fn test_project_layer_keeps_global_flags() {
        let global = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write_config(
            global.path(),
            r#"{"cache": {"promoteFallbackHits": false}, "retry": {"classifyErrors": true, "jitter": true}}"#,
        );
        write_config(project.path(), r#"{"budget": {"maxTotalTokens": 2000}}"#);

        let config =
            WayfarerConfig::load_layers(Some(global.path()), Some(project.path()), |_| None)
                .unwrap();

        assert!(!config.cache.promote_fallback_hits());
        assert!(config.retry.classify_errors());
        assert!(config.retry.jitter());
        assert_eq!(config.budget.max_total_tokens, 2000);
    }

    #[test]
    fn test_project_layer_can_override_flags() {
        let global = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        write_config(global.path(), r#"{"retry": {"classifyErrors": true}}"#);
        write_config(project.path(), r#"{"retry": {"classifyErrors": false}}"#);

        let config =
            WayfarerConfig::load_layers(Some(global.path()), Some(project.path()), |_| None)
                .unwrap();
        assert!(!config.retry.classify_errors());
    }

    #[test]
    fn test_missing_layers_use_defaults() {
        let empty = TempDir::new().unwrap();
        let config = WayfarerConfig::load_layers(
            Some(empty.path().join("nowhere").as_path()),
            None,
            |name| (name == ENV_MODEL).then(|| "gpt-4o".to_string()),
        )
        .unwrap();

        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.cache.fallback_dir, "cache");
    }

    #[test]
    fn test_parse_error_names_layer() {
        let project = TempDir::new().unwrap();
        write_config(project.path(), "{ not json");

        let err = WayfarerConfig::load_layers(None, Some(project.path()), |_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("project config"));
    }

    #[test]
    fn test_absent_flags_not_serialized() {
        let json = serde_json::to_value(WayfarerConfig::default()).unwrap();
        assert!(json["cache"].get("promoteFallbackHits").is_none());
        assert!(json["retry"].get("classifyErrors").is_none());
    }
}
