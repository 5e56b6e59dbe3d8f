//! 수집 모듈 에러 타입
//!
//! [`IngestError`]는 수집 모듈 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for GranaryError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use granary_core::error::{AppendError, GranaryError, ParseError, PoolError};

/// 수집 모듈 도메인 에러
///
/// 파싱, 라우팅, 목적지 기록, 워커 풀, 설정 등 수집 파이프라인
/// 내부의 모든 에러 상황을 포괄합니다.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 라인 파싱 실패
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 유효한 일/분 버킷으로 변환할 수 없는 캡처 시각
    #[error("unroutable capture time: {millis}")]
    CaptureTime {
        /// 문제가 된 epoch 밀리초 값
        millis: i64,
    },

    /// 목적지 기록 실패
    #[error("append error: {0}")]
    Append(#[from] AppendError),

    /// 워커 풀 에러
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 빌더에 필수 구성 요소가 누락됨
    #[error("missing component: {0}")]
    MissingComponent(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for GranaryError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Parse(e) => GranaryError::Parse(e),
            IngestError::Append(e) => GranaryError::Append(e),
            IngestError::Pool(e) => GranaryError::Pool(e),
            IngestError::Io(e) => GranaryError::Io(e),
            other => GranaryError::Ingest(other.to_string()),
        }
    }
}
