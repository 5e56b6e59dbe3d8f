//! 목적지 라우터 — 캡처 시각과 설정으로 출력 경로를 결정하는 순수 함수
//!
//! 경로 형식:
//! `{warehouse_root}/csv/{module}/{yyyyMMdd}/{protocol}_{yyyyMMddHHmm}.{node}.csv`
//!
//! 같은 (모듈, 노드, 프로토콜, 분 버킷) 조합은 항상 같은 경로를
//! 반환하며, 이 경로가 목적지 레지스트리의 집계 키가 됩니다.

use std::path::PathBuf;

use granary_core::time;

use crate::config::AnalystConfig;
use crate::error::IngestError;

/// 캡처 시각의 목적지 CSV 경로를 계산합니다.
///
/// 캡처 시각이 유효한 달력 날짜/분으로 변환되지 않으면
/// [`IngestError::CaptureTime`]을 반환합니다.
pub fn route(capture_millis: i64, config: &AnalystConfig) -> Result<PathBuf, IngestError> {
    let day = time::day_bucket(capture_millis).ok_or(IngestError::CaptureTime {
        millis: capture_millis,
    })?;
    let minute = time::minute_bucket(capture_millis).ok_or(IngestError::CaptureTime {
        millis: capture_millis,
    })?;
    let file_name = format!("{}_{}.{}.csv", config.protocol, minute, config.node);
    Ok(config
        .warehouse_root
        .join("csv")
        .join(&config.module)
        .join(day)
        .join(file_name))
}
