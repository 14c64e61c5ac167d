//! # wayfarer-invoker
//!
//! Resilient cached invocation of the remote text-generation service.
//!
//! ## 흐름
//!
//! 1. 응답 캐시 확인 (hit이면 원격 호출 없음)
//! 2. 마지막 사용자 메시지를 토큰 예산에 맞게 축소
//! 3. 지수 백오프로 재시도하며 원격 호출
//! 4. 성공 응답을 캐시에 기록 후 반환
//!
//! ## 사용법
//!
//! ```ignore
//! use wayfarer_invoker::Invoker;
//! use wayfarer_provider::RequestSpec;
//!
//! let invoker = Invoker::builder(provider, cache)
//!     .on_progress(|msg| eprintln!("{}", msg))
//!     .build();
//!
//! let spec = RequestSpec::new("gpt-3.5-turbo")
//!     .system("You are a travel planner.")
//!     .user("Three days in Kyoto in April");
//! let itinerary = invoker.invoke("itinerary", &spec, Duration::from_secs(86_400)).await?;
//! ```

pub mod error;
pub mod invoker;
pub mod progress;
pub mod structured;

pub use error::InvocationError;
pub use invoker::{Invoker, InvokerBuilder, CHAT_REQUEST_CLASS};
pub use progress::{ProgressCallback, ProgressNotice, ProgressReporter};
pub use structured::{extract_json, parse_json};
