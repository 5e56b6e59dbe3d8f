//! 수집 모듈 설정
//!
//! [`AnalystConfig`]는 core의 [`GranaryConfig`](granary_core::config::GranaryConfig)에서
//! 웨어하우스/수집 섹션을 모아 분석기가 쓰는 단일 설정으로 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use granary_core::config::GranaryConfig;
//! use granary_ingest::config::AnalystConfig;
//!
//! let core_config = GranaryConfig::default();
//! let config = AnalystConfig::from_core(&core_config);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use granary_core::config::GranaryConfig;

use crate::error::IngestError;

/// 분석기 설정
///
/// 웨어하우스 위치(core의 warehouse 섹션)와 수집 모듈 파라미터
/// (core의 ingest 섹션)를 하나로 합친 설정입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// 웨어하우스 루트 경로. 출력은 `{root}/csv/...` 아래에 생성됨
    pub warehouse_root: PathBuf,
    /// 노드 식별자. 출력 파일 이름에 포함됨
    pub node: String,
    /// 모듈 이름. 출력 디렉토리 경로에 포함됨
    pub module: String,
    /// 프로토콜 레이블. 출력 파일 이름에 포함됨
    pub protocol: String,
    /// 병렬 처리 워커 수 (파티션 수이자 동시 실행 상한)
    pub workers: usize,
    /// 이 라인 수 이하면 직렬 처리
    pub serial_threshold: usize,
    /// 목적지별 버퍼 최대 행 수 (도달 시 자동 플러시)
    pub output_max_lines: usize,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self::from_core(&GranaryConfig::default())
    }
}

impl AnalystConfig {
    /// core 설정에서 분석기 설정을 생성합니다.
    pub fn from_core(core: &GranaryConfig) -> Self {
        Self {
            warehouse_root: PathBuf::from(&core.warehouse.root),
            node: core.warehouse.node.clone(),
            module: core.ingest.module.clone(),
            protocol: core.ingest.protocol.clone(),
            workers: core.ingest.workers,
            serial_threshold: core.ingest.serial_threshold,
            output_max_lines: core.ingest.output_max_lines,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        const MAX_WORKERS: usize = 1024;
        const MAX_OUTPUT_LINES: usize = 10_000_000;

        if self.warehouse_root.as_os_str().is_empty() {
            return Err(IngestError::Config {
                field: "warehouse_root".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        validate_identifier("node", &self.node)?;
        validate_identifier("module", &self.module)?;
        validate_identifier("protocol", &self.protocol)?;

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(IngestError::Config {
                field: "workers".to_owned(),
                reason: format!("must be 1-{}", MAX_WORKERS),
            });
        }

        if self.output_max_lines == 0 || self.output_max_lines > MAX_OUTPUT_LINES {
            return Err(IngestError::Config {
                field: "output_max_lines".to_owned(),
                reason: format!("must be 1-{}", MAX_OUTPUT_LINES),
            });
        }

        Ok(())
    }
}

/// 출력 경로/파일 이름에 들어가는 식별자 필드를 검증합니다.
fn validate_identifier(field: &str, value: &str) -> Result<(), IngestError> {
    if value.is_empty() {
        return Err(IngestError::Config {
            field: field.to_owned(),
            reason: "must not be empty".to_owned(),
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(IngestError::Config {
            field: field.to_owned(),
            reason: format!(
                "'{}' must contain only ASCII alphanumerics, '-' or '_'",
                value
            ),
        });
    }
    Ok(())
}

/// 분석기 설정 빌더
#[derive(Default)]
pub struct AnalystConfigBuilder {
    config: AnalystConfig,
}

impl AnalystConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 웨어하우스 루트 경로를 설정합니다.
    pub fn warehouse_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.warehouse_root = root.into();
        self
    }

    /// 노드 식별자를 설정합니다.
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.config.node = node.into();
        self
    }

    /// 모듈 이름을 설정합니다.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.config.module = module.into();
        self
    }

    /// 프로토콜 레이블을 설정합니다.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.protocol = protocol.into();
        self
    }

    /// 워커 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 직렬 처리 임계 라인 수를 설정합니다.
    pub fn serial_threshold(mut self, threshold: usize) -> Self {
        self.config.serial_threshold = threshold;
        self
    }

    /// 목적지별 버퍼 최대 행 수를 설정합니다.
    pub fn output_max_lines(mut self, max_lines: usize) -> Self {
        self.config.output_max_lines = max_lines;
        self
    }

    /// 설정을 검증하고 `AnalystConfig`를 생성합니다.
    pub fn build(self) -> Result<AnalystConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
