//! 기준 라인 파서 — 자기 기술적 JSON 캡처 라인
//!
//! [`JsonLineParser`]는 라인 하나를 JSON 객체로 파싱하여 설정된
//! 타임스탬프 필드(epoch 밀리초)와 컬럼 목록을 [`JsonRecord`]로
//! 투영합니다. 컬럼 순서가 곧 CSV 열 순서이며, 없는 컬럼은 빈 필드로
//! 렌더링됩니다.
//!
//! 프로토콜별 고정 스키마 레코드가 필요한 임베더는
//! [`LineParser`](granary_core::analyst::LineParser)를 직접 구현해
//! 등록하면 됩니다.

use std::sync::Arc;

use serde_json::Value;

use granary_core::analyst::LineParser;
use granary_core::error::ParseError;
use granary_core::record::{Record, render_row};

/// JSON 캡처 라인에서 투영된 레코드
#[derive(Debug, Clone)]
pub struct JsonRecord {
    capture_time: i64,
    row: String,
    header: Arc<str>,
}

impl Record for JsonRecord {
    fn capture_time(&self) -> i64 {
        self.capture_time
    }

    fn csv_header(&self) -> &str {
        &self.header
    }

    fn to_csv(&self) -> String {
        self.row.clone()
    }
}

/// JSON 라인 파서
///
/// 생성 시 컬럼 목록과 타임스탬프 필드 이름을 고정합니다.
/// 같은 파서가 만든 모든 레코드는 동일한 헤더를 공유합니다.
pub struct JsonLineParser {
    columns: Vec<String>,
    time_field: String,
    header: Arc<str>,
}

impl JsonLineParser {
    /// 컬럼 목록과 타임스탬프 필드 이름으로 파서를 생성합니다.
    pub fn new<S: Into<String>>(columns: Vec<S>, time_field: impl Into<String>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let header: Arc<str> = render_row(&columns).into();
        Self {
            columns,
            time_field: time_field.into(),
            header,
        }
    }

    /// 이 파서가 렌더링하는 CSV 헤더를 반환합니다.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl LineParser<JsonRecord> for JsonLineParser {
    fn format_name(&self) -> &str {
        "json"
    }

    fn parse(&self, line: &str) -> Result<JsonRecord, ParseError> {
        let value: Value = serde_json::from_str(line).map_err(|e| ParseError::Failed {
            offset: e.column(),
            reason: e.to_string(),
        })?;
        let object = value.as_object().ok_or_else(|| ParseError::Failed {
            offset: 0,
            reason: "expected a JSON object".to_owned(),
        })?;

        let capture_time = match object.get(&self.time_field) {
            None => {
                return Err(ParseError::MissingField {
                    field: self.time_field.clone(),
                });
            }
            Some(raw) => raw.as_i64().ok_or_else(|| ParseError::Timestamp {
                value: raw.to_string(),
                reason: "expected epoch milliseconds as an integer".to_owned(),
            })?,
        };

        let fields: Vec<String> = self
            .columns
            .iter()
            .map(|column| field_text(object.get(column)))
            .collect();

        Ok(JsonRecord {
            capture_time,
            row: render_row(&fields),
            header: Arc::clone(&self.header),
        })
    }
}

/// JSON 값을 CSV 필드 텍스트로 변환합니다.
///
/// 문자열은 그대로, 없는 값과 null은 빈 필드, 그 외는 JSON 표기 그대로.
fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
