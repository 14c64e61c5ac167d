//! Progress notices
//!
//! 호출 진행 상황을 사람이 읽는 문장으로 관찰자에게 전달한다.
//! 관찰자는 제어 흐름에 영향을 주지 않는다.

use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Observer callback
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// 진행 단계
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressNotice {
    /// 캐시 확인 전
    Preparing,
    /// 캐시 hit
    CacheHit,
    /// 프롬프트 축소
    Optimizing,
    /// 첫 원격 호출
    Calling,
    /// 재시도 (1-based attempt)
    Retrying { attempt: u32, max_attempts: u32 },
    /// 시도 실패
    Failed(String),
    /// 원격 호출 성공
    Succeeded,
}

impl fmt::Display for ProgressNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressNotice::Preparing => write!(f, "Preparing request..."),
            ProgressNotice::CacheHit => write!(f, "Retrieved response from cache"),
            ProgressNotice::Optimizing => {
                write!(f, "Optimizing prompt to fit within token limits...")
            }
            ProgressNotice::Calling => write!(f, "Making request..."),
            ProgressNotice::Retrying {
                attempt,
                max_attempts,
            } => write!(f, "Retrying request (attempt {}/{})...", attempt, max_attempts),
            ProgressNotice::Failed(message) => write!(f, "Error: {}", message),
            ProgressNotice::Succeeded => write!(f, "Successfully received response"),
        }
    }
}

/// Optional observer wrapper
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn report(&self, notice: &ProgressNotice) {
        trace!(notice = %notice, "Progress");
        if let Some(callback) = &self.callback {
            callback(&notice.to_string());
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("observed", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_notice_text() {
        assert_eq!(
            ProgressNotice::Retrying {
                attempt: 2,
                max_attempts: 3
            }
            .to_string(),
            "Retrying request (attempt 2/3)..."
        );
        assert_eq!(
            ProgressNotice::Failed("Network error: reset".into()).to_string(),
            "Error: Network error: reset"
        );
    }

    #[test]
    fn test_reporter_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |msg: &str| {
            sink.lock().unwrap().push(msg.to_string());
        }));

        reporter.report(&ProgressNotice::Preparing);
        reporter.report(&ProgressNotice::CacheHit);
        ProgressReporter::silent().report(&ProgressNotice::Calling);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Preparing request...", "Retrieved response from cache"]
        );
    }
}
