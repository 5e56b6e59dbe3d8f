#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`analyst`]: 파일 단위 분석 오케스트레이터 (직렬/병렬 모드, 완료 배리어)
//! - [`parser`]: 기준 JSON 라인 파서 (임베더는 자체 파서를 등록 가능)
//! - [`partition`]: 워커별 연속 청크 분할
//! - [`router`]: 캡처 시각 → 목적지 CSV 경로 순수 함수
//! - [`registry`]: 분석 1회 범위의 목적지 어펜더 레지스트리
//! - [`config`]: 분석기 설정 (core 설정 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 처리 흐름
//!
//! ```text
//! file --> lines --> [serial | partition -> worker pool] --> per line:
//!     LineParser -> FilterChain -> route -> Appender.add
//! analysis()가 완료 배리어까지 대기, free()가 전체 플러시를 보장
//! ```

pub mod analyst;
pub mod config;
pub mod error;
pub mod parser;
pub mod partition;
pub mod registry;
pub mod router;

// --- 주요 타입 re-export ---

// 분석기
pub use analyst::{SourceAnalyst, SourceAnalystBuilder};

// 설정
pub use config::{AnalystConfig, AnalystConfigBuilder};

// 에러
pub use error::IngestError;

// 파서
pub use parser::{JsonLineParser, JsonRecord};

// 파티셔너 / 라우터
pub use partition::partition;
pub use router::route;
