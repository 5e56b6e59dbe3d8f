//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `granary_`
//! - 모듈명: `ingest_`, `appender_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(granary_core::metrics::INGEST_LINES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 모듈 레이블 키
pub const LABEL_MODULE: &str = "module";

/// 프로토콜 레이블 키
pub const LABEL_PROTOCOL: &str = "protocol";

/// 필터 이름 레이블 키
pub const LABEL_FILTER: &str = "filter";

// ─── Ingest 메트릭 ─────────────────────────────────────────────────

/// Ingest: 읽어들인 전체 라인 수 (counter)
pub const INGEST_LINES_TOTAL: &str = "granary_ingest_lines_total";

/// Ingest: 파싱/라우팅 실패로 건너뛴 라인 수 (counter)
pub const INGEST_PARSE_ERRORS_TOTAL: &str = "granary_ingest_parse_errors_total";

/// Ingest: 필터가 거부한 레코드 수 (counter)
pub const INGEST_RECORDS_REJECTED_TOTAL: &str = "granary_ingest_records_rejected_total";

/// Ingest: 목적지 버퍼에 추가된 행 수 (counter)
pub const INGEST_ROWS_APPENDED_TOTAL: &str = "granary_ingest_rows_appended_total";

/// Ingest: 실패한 병렬 청크 수 (counter)
pub const INGEST_CHUNK_FAILURES_TOTAL: &str = "granary_ingest_chunk_failures_total";

/// Ingest: 분석한 파일 수 (counter)
pub const INGEST_FILES_ANALYZED_TOTAL: &str = "granary_ingest_files_analyzed_total";

/// Ingest: 파일 하나의 분석 소요 시간 (histogram, 초)
pub const INGEST_ANALYSIS_DURATION_SECONDS: &str = "granary_ingest_analysis_duration_seconds";

// ─── Appender 메트릭 ───────────────────────────────────────────────

/// Appender: 버퍼 플러시 횟수 (counter)
pub const APPENDER_FLUSHES_TOTAL: &str = "granary_appender_flushes_total";

/// Appender: 목적지에 기록된 행 수 (counter)
pub const APPENDER_ROWS_WRITTEN_TOTAL: &str = "granary_appender_rows_written_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 분석 소요 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위, 로그 단위 분포 (파일 크기에 따라 편차가 큼)
pub const ANALYSIS_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// `metrics::describe_counter!()`, `describe_histogram!()`을 호출하여
/// Prometheus HELP 텍스트를 설정합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 임베더의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        INGEST_LINES_TOTAL,
        "Total number of raw lines read from analyzed files"
    );
    describe_counter!(
        INGEST_PARSE_ERRORS_TOTAL,
        "Total number of lines skipped due to parse or routing failures"
    );
    describe_counter!(
        INGEST_RECORDS_REJECTED_TOTAL,
        "Total number of records dropped by a rejecting filter"
    );
    describe_counter!(
        INGEST_ROWS_APPENDED_TOTAL,
        "Total number of rows appended to destination buffers"
    );
    describe_counter!(
        INGEST_CHUNK_FAILURES_TOTAL,
        "Total number of parallel chunks that failed mid-processing"
    );
    describe_counter!(
        INGEST_FILES_ANALYZED_TOTAL,
        "Total number of capture files analyzed"
    );
    describe_histogram!(
        INGEST_ANALYSIS_DURATION_SECONDS,
        "Time to analyze a single capture file in seconds"
    );
    describe_counter!(
        APPENDER_FLUSHES_TOTAL,
        "Total number of destination buffer flushes"
    );
    describe_counter!(
        APPENDER_ROWS_WRITTEN_TOTAL,
        "Total number of rows written to destination files"
    );
}
