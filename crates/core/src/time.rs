//! 시간 버킷 — 캡처 타임스탬프를 일/분 버킷 문자열로 변환
//!
//! 모든 버킷은 UTC 기준입니다. 호스트 타임존에 따라 같은 레코드가
//! 다른 목적지로 라우팅되는 일이 없어야 합니다.

use chrono::{DateTime, Utc};

/// 일 버킷 포맷 (`yyyyMMdd`)
pub const DAY_BUCKET_FORMAT: &str = "%Y%m%d";

/// 분 버킷 포맷 (`yyyyMMddHHmm`)
pub const MINUTE_BUCKET_FORMAT: &str = "%Y%m%d%H%M";

/// 캡처 시각(epoch 밀리초)의 일 버킷 문자열을 반환합니다.
///
/// 유효한 달력 날짜로 변환할 수 없는 값이면 `None`을 반환합니다.
pub fn day_bucket(capture_millis: i64) -> Option<String> {
    Some(to_utc(capture_millis)?.format(DAY_BUCKET_FORMAT).to_string())
}

/// 캡처 시각(epoch 밀리초)의 분 버킷 문자열을 반환합니다.
pub fn minute_bucket(capture_millis: i64) -> Option<String> {
    Some(
        to_utc(capture_millis)?
            .format(MINUTE_BUCKET_FORMAT)
            .to_string(),
    )
}

fn to_utc(capture_millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(capture_millis)
}
