//! 설정 관리 — granary.toml 파싱 및 런타임 설정
//!
//! [`GranaryConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`GRANARY_WAREHOUSE_ROOT=/data` 형식)
//! 2. 설정 파일 (`granary.toml`)
//! 3. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), granary_core::error::GranaryError> {
//! use granary_core::config::GranaryConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = GranaryConfig::load("granary.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = GranaryConfig::parse("[warehouse]\nnode = \"edge-7\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, GranaryError};

/// Granary 통합 설정
///
/// `granary.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GranaryConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 데이터 웨어하우스 설정
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// 수집 모듈 설정
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 출력 형식 (text, json)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

/// 데이터 웨어하우스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// 웨어하우스 루트 경로. CSV 출력은 `{root}/csv/...` 아래에 생성됨
    pub root: String,
    /// 노드 식별자. 출력 파일 이름에 포함됨
    pub node: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root: "/var/lib/granary/warehouse".to_owned(),
            node: "node-1".to_owned(),
        }
    }
}

/// 수집 모듈 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 모듈 이름. 출력 디렉토리 경로에 포함됨
    pub module: String,
    /// 프로토콜 레이블. 출력 파일 이름에 포함됨
    pub protocol: String,
    /// 병렬 처리 워커 수
    pub workers: usize,
    /// 이 라인 수 이하면 직렬 처리
    pub serial_threshold: usize,
    /// 목적지별 버퍼 최대 행 수 (도달 시 자동 플러시)
    pub output_max_lines: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            module: "src".to_owned(),
            protocol: "flow".to_owned(),
            workers: 4,
            serial_threshold: 200,
            output_max_lines: 1024,
        }
    }
}

impl GranaryConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, GranaryError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, GranaryError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GranaryError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                GranaryError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, GranaryError> {
        toml::from_str(toml_str).map_err(|e| {
            GranaryError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `GRANARY_{SECTION}_{FIELD}`
    /// 예: `GRANARY_WAREHOUSE_ROOT=/data/warehouse`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "GRANARY_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "GRANARY_GENERAL_LOG_FORMAT");

        // Warehouse
        override_string(&mut self.warehouse.root, "GRANARY_WAREHOUSE_ROOT");
        override_string(&mut self.warehouse.node, "GRANARY_WAREHOUSE_NODE");

        // Ingest
        override_bool(&mut self.ingest.enabled, "GRANARY_INGEST_ENABLED");
        override_string(&mut self.ingest.module, "GRANARY_INGEST_MODULE");
        override_string(&mut self.ingest.protocol, "GRANARY_INGEST_PROTOCOL");
        override_usize(&mut self.ingest.workers, "GRANARY_INGEST_WORKERS");
        override_usize(
            &mut self.ingest.serial_threshold,
            "GRANARY_INGEST_SERIAL_THRESHOLD",
        );
        override_usize(
            &mut self.ingest.output_max_lines,
            "GRANARY_INGEST_OUTPUT_MAX_LINES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), GranaryError> {
        const MAX_WORKERS: usize = 1024;
        const MAX_OUTPUT_LINES: usize = 10_000_000;

        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.warehouse.root.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "warehouse.root".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        // 식별자는 출력 경로/파일 이름에 그대로 들어가므로 경로 안전해야 함
        validate_identifier("warehouse.node", &self.warehouse.node)?;
        validate_identifier("ingest.module", &self.ingest.module)?;
        validate_identifier("ingest.protocol", &self.ingest.protocol)?;

        if self.ingest.workers == 0 || self.ingest.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue {
                field: "ingest.workers".to_owned(),
                reason: format!("must be 1-{}", MAX_WORKERS),
            }
            .into());
        }

        if self.ingest.output_max_lines == 0 || self.ingest.output_max_lines > MAX_OUTPUT_LINES {
            return Err(ConfigError::InvalidValue {
                field: "ingest.output_max_lines".to_owned(),
                reason: format!("must be 1-{}", MAX_OUTPUT_LINES),
            }
            .into());
        }

        Ok(())
    }
}

/// 식별자 필드를 검증합니다 (경로/파일 이름에 포함되는 값).
pub fn validate_identifier(field: &str, value: &str) -> Result<(), GranaryError> {
    if value.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into());
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!(
                "'{}' must contain only ASCII alphanumerics, '-' or '_'",
                value
            ),
        }
        .into());
    }
    Ok(())
}

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %value, "ignoring non-boolean env override"),
        }
    }
}

fn override_usize(target: &mut usize, key: &str) {
    if let Ok(value) = std::env::var(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(key, value = %value, "ignoring non-numeric env override"),
        }
    }
}
