//! 에러 타입 — 도메인별 에러 정의

/// Granary 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum GranaryError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 라인 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 목적지 기록 에러
    #[error("append error: {0}")]
    Append(#[from] AppendError),

    /// 워커 풀 에러
    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),

    /// 수집 모듈 에러
    #[error("ingest error: {0}")]
    Ingest(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 라인 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 구조가 잘못된 라인
    #[error("parse failed at offset {offset}: {reason}")]
    Failed { offset: usize, reason: String },

    /// 필수 필드 누락
    #[error("missing field '{field}'")]
    MissingField { field: String },

    /// 해석 불가능한 캡처 타임스탬프
    #[error("invalid capture timestamp {value}: {reason}")]
    Timestamp { value: String, reason: String },
}

/// 목적지 기록 에러
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    /// 목적지 파일 생성 실패
    #[error("failed to create destination {path}: {source}")]
    Create {
        /// 목적지 경로
        path: String,
        /// 원인 I/O 에러
        source: std::io::Error,
    },

    /// 목적지 파일 쓰기 실패
    #[error("failed to write destination {path}: {source}")]
    Write {
        /// 목적지 경로
        path: String,
        /// 원인 I/O 에러
        source: std::io::Error,
    },
}

/// 워커 풀 에러
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// 풀이 닫힌 뒤 작업이 제출됨
    #[error("worker pool is closed")]
    Closed,

    /// 워커 작업이 패닉으로 종료됨
    #[error("worker task panicked: {0}")]
    Panicked(String),

    /// 워커 작업이 완료 전에 취소됨
    #[error("worker task was cancelled")]
    Cancelled,
}
