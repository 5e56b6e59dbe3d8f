//! 소스 분석 오케스트레이터 — 파일 단위 수집 흐름 관리
//!
//! [`SourceAnalyst`]는 캡처 파일 하나를 전부 읽어 라인 단위로
//! 파싱 → 필터 체인 → 라우팅 → 어펜더 누적을 수행합니다.
//!
//! # 모드 결정
//! 라인 수가 `serial_threshold` 이하이거나 워커 수가 1 이하이면 직렬
//! 모드로, 그 외에는 라인을 워커별 청크로 나눠 워커 풀에 제출하는
//! 병렬 모드로 동작합니다. 병렬 모드의 오케스트레이터는 모든 청크가
//! 끝날 때까지 대기합니다 (완료 배리어).
//!
//! # 실패 격리
//! - 라인 파싱/라우팅 실패: 로그 후 해당 라인만 건너뜀
//! - 필터 거부 (Reject 정책): 레코드 드롭, 필터 이름과 함께 기록
//! - 청크 실패 (병렬 모드): 로그 후 해당 청크의 남은 라인만 유실,
//!   형제 청크와 배리어에는 영향 없음 (best-effort)
//! - 플러시 실패: `free` 호출자에게 그대로 전파 (무음 유실 금지)

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use granary_core::analyst::{Analyst, LineParser};
use granary_core::error::GranaryError;
use granary_core::filter::{ChainOutcome, FilterChain, FilterChainBuilder, RecordFilter};
use granary_core::metrics as metric_names;
use granary_core::pool::WorkerPool;
use granary_core::record::Record;

use crate::config::AnalystConfig;
use crate::error::IngestError;
use crate::partition::partition;
use crate::registry::{SerialRegistry, SharedRegistry};
use crate::router::route;

/// 파일 분석 1회가 소유하는 활성 레지스트리
enum ActiveRegistry {
    Serial(SerialRegistry),
    Shared(Arc<SharedRegistry>),
}

/// 분석 누적 카운터 (청크 워커와 공유)
#[derive(Debug, Default, Clone)]
struct IngestStats {
    lines: Arc<AtomicU64>,
    parse_errors: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
    appended: Arc<AtomicU64>,
    chunk_failures: Arc<AtomicU64>,
}

/// 소스 분석기
///
/// core의 [`Analyst`] trait을 구현하여 파일 수신 측에서
/// `analysis` → `free` 생명주기로 호출됩니다. `free`가 반환되어야
/// 버퍼에 누적된 모든 행의 내구성이 보장됩니다.
pub struct SourceAnalyst<R: Record> {
    config: AnalystConfig,
    parser: Arc<dyn LineParser<R>>,
    chain: Arc<FilterChain<R>>,
    pool: Arc<WorkerPool>,
    registry: Option<ActiveRegistry>,
    stats: IngestStats,
}

impl<R: Record> SourceAnalyst<R> {
    /// 새 빌더를 생성합니다.
    pub fn builder() -> SourceAnalystBuilder<R> {
        SourceAnalystBuilder::new()
    }

    /// 분석기 설정을 반환합니다.
    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    /// 공유 워커 풀 핸들을 반환합니다.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// 읽어들인 전체 라인 수를 반환합니다.
    pub fn line_count(&self) -> u64 {
        self.stats.lines.load(Ordering::Relaxed)
    }

    /// 파싱/라우팅 실패로 건너뛴 라인 수를 반환합니다.
    pub fn parse_error_count(&self) -> u64 {
        self.stats.parse_errors.load(Ordering::Relaxed)
    }

    /// 필터가 거부한 레코드 수를 반환합니다.
    pub fn rejected_count(&self) -> u64 {
        self.stats.rejected.load(Ordering::Relaxed)
    }

    /// 목적지 버퍼에 추가된 행 수를 반환합니다.
    pub fn appended_count(&self) -> u64 {
        self.stats.appended.load(Ordering::Relaxed)
    }

    /// 실패한 병렬 청크 수를 반환합니다.
    pub fn chunk_failure_count(&self) -> u64 {
        self.stats.chunk_failures.load(Ordering::Relaxed)
    }

    /// 현재 활성 레지스트리의 목적지 수를 반환합니다.
    pub fn destination_count(&self) -> usize {
        match &self.registry {
            None => 0,
            Some(ActiveRegistry::Serial(registry)) => registry.len(),
            Some(ActiveRegistry::Shared(registry)) => registry.len(),
        }
    }
}

/// 직렬 모드 판정
///
/// 라인 수가 임계치 이하이거나 워커가 1 이하면 직렬로 처리한다.
fn serial_mode(line_count: usize, config: &AnalystConfig) -> bool {
    line_count <= config.serial_threshold || config.workers <= 1
}

/// 라인 하나를 파싱하고 필터 체인을 통과시킵니다.
///
/// 복구 가능한 실패(파싱 실패, 필터 거부)는 카운터와 로그로 기록한 뒤
/// `None`을 반환하여 배치 전체를 중단하지 않습니다.
fn prepare_record<R: Record>(
    line: &str,
    parser: &dyn LineParser<R>,
    chain: &FilterChain<R>,
    stats: &IngestStats,
) -> Option<R> {
    stats.lines.fetch_add(1, Ordering::Relaxed);
    counter!(metric_names::INGEST_LINES_TOTAL).increment(1);

    let record = match parser.parse(line) {
        Ok(record) => record,
        Err(e) => {
            stats.parse_errors.fetch_add(1, Ordering::Relaxed);
            counter!(metric_names::INGEST_PARSE_ERRORS_TOTAL).increment(1);
            warn!(error = %e, line = %line, "failed to parse line, skipping");
            return None;
        }
    };

    match chain.evaluate(&record) {
        ChainOutcome::Append { .. } => Some(record),
        ChainOutcome::Reject { filter, .. } => {
            stats.rejected.fetch_add(1, Ordering::Relaxed);
            counter!(metric_names::INGEST_RECORDS_REJECTED_TOTAL).increment(1);
            warn!(filter = %filter, record = ?record, "record rejected by filter");
            None
        }
    }
}

/// 직렬 모드: 단일 패스로 전체 라인을 처리합니다.
fn analyze_serial<R: Record>(
    lines: Vec<String>,
    parser: Arc<dyn LineParser<R>>,
    chain: Arc<FilterChain<R>>,
    config: AnalystConfig,
    stats: IngestStats,
) -> Result<SerialRegistry, IngestError> {
    let mut registry = SerialRegistry::new();
    for line in &lines {
        let Some(record) = prepare_record(line, parser.as_ref(), &chain, &stats) else {
            continue;
        };
        let path = match route(record.capture_time(), &config) {
            Ok(path) => path,
            Err(e) => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                counter!(metric_names::INGEST_PARSE_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "unroutable record, skipping");
                continue;
            }
        };
        registry
            .obtain(path, record.csv_header(), config.output_max_lines)
            .add(record.to_csv())?;
        stats.appended.fetch_add(1, Ordering::Relaxed);
        counter!(metric_names::INGEST_ROWS_APPENDED_TOTAL).increment(1);
    }
    Ok(registry)
}

/// 병렬 모드: 청크 하나를 공유 레지스트리에 대해 처리합니다.
///
/// 에러가 반환되면 이 청크의 남은 라인은 처리되지 않습니다. 호출 측은
/// 에러를 청크 단위로 격리하여 형제 청크에 영향을 주지 않습니다.
fn analyze_chunk<R: Record>(
    chunk: usize,
    lines: Vec<String>,
    parser: Arc<dyn LineParser<R>>,
    chain: Arc<FilterChain<R>>,
    config: Arc<AnalystConfig>,
    registry: Arc<SharedRegistry>,
    stats: IngestStats,
) -> Result<(), IngestError> {
    debug!(chunk, lines = lines.len(), "chunk processing started");
    for line in &lines {
        let Some(record) = prepare_record(line, parser.as_ref(), &chain, &stats) else {
            continue;
        };
        let path = match route(record.capture_time(), &config) {
            Ok(path) => path,
            Err(e) => {
                stats.parse_errors.fetch_add(1, Ordering::Relaxed);
                counter!(metric_names::INGEST_PARSE_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "unroutable record, skipping");
                continue;
            }
        };
        registry
            .obtain(path, record.csv_header(), config.output_max_lines)
            .add(record.to_csv())?;
        stats.appended.fetch_add(1, Ordering::Relaxed);
        counter!(metric_names::INGEST_ROWS_APPENDED_TOTAL).increment(1);
    }
    debug!(chunk, "chunk processing finished");
    Ok(())
}

impl<'p, R: Record> Analyst<&'p Path> for SourceAnalyst<R> {
    /// 파일 하나를 분석하여 목적지 버퍼에 누적합니다.
    ///
    /// 빈 파일은 경고만 남기고 정상 반환합니다. 병렬 모드에서 청크가
    /// 실패하면 해당 청크의 남은 라인은 이 실행에서 유실됩니다
    /// (best-effort, at-least-once 아님).
    async fn analysis(&mut self, file: &'p Path) -> Result<(), GranaryError> {
        let analysis_id = uuid::Uuid::new_v4();
        let started = Instant::now();

        let content = tokio::fs::read_to_string(file).await?;
        let lines: Vec<String> = content.lines().map(str::to_owned).collect();
        drop(content);

        if lines.is_empty() {
            warn!(
                analysis_id = %analysis_id,
                file = %file.display(),
                "file has no content, skipping analysis"
            );
            return Ok(());
        }

        counter!(metric_names::INGEST_FILES_ANALYZED_TOTAL).increment(1);
        let line_count = lines.len();

        if serial_mode(line_count, &self.config) {
            debug!(
                analysis_id = %analysis_id,
                file = %file.display(),
                lines = line_count,
                "analyzing serially"
            );
            let parser = Arc::clone(&self.parser);
            let chain = Arc::clone(&self.chain);
            let config = self.config.clone();
            let stats = self.stats.clone();
            let registry = self
                .pool
                .run(move || analyze_serial(lines, parser, chain, config, stats))
                .await
                .map_err(GranaryError::Pool)?
                .map_err(GranaryError::from)?;
            self.registry = Some(ActiveRegistry::Serial(registry));
        } else {
            debug!(
                analysis_id = %analysis_id,
                file = %file.display(),
                lines = line_count,
                workers = self.config.workers,
                "analyzing in parallel"
            );
            let shared = Arc::new(SharedRegistry::new());
            let config = Arc::new(self.config.clone());
            let chunks = partition(lines, self.config.workers);

            let mut handles = Vec::with_capacity(chunks.len());
            for (index, chunk) in chunks.into_iter().enumerate() {
                let parser = Arc::clone(&self.parser);
                let chain = Arc::clone(&self.chain);
                let config = Arc::clone(&config);
                let registry = Arc::clone(&shared);
                let stats = self.stats.clone();
                handles.push((
                    index,
                    self.pool.spawn(move || {
                        analyze_chunk(index, chunk, parser, chain, config, registry, stats)
                    }),
                ));
            }

            // 완료 배리어: 모든 청크가 끝날 때까지 대기한다. 청크 실패는
            // 기록만 하고 형제 청크를 중단하지 않는다.
            for (index, handle) in handles {
                match handle.join().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        self.stats.chunk_failures.fetch_add(1, Ordering::Relaxed);
                        counter!(metric_names::INGEST_CHUNK_FAILURES_TOTAL).increment(1);
                        error!(
                            analysis_id = %analysis_id,
                            chunk = index,
                            error = %e,
                            "chunk failed, remaining lines in this chunk are lost"
                        );
                    }
                    Err(e) => {
                        self.stats.chunk_failures.fetch_add(1, Ordering::Relaxed);
                        counter!(metric_names::INGEST_CHUNK_FAILURES_TOTAL).increment(1);
                        error!(
                            analysis_id = %analysis_id,
                            chunk = index,
                            error = %e,
                            "chunk worker did not complete"
                        );
                    }
                }
            }
            self.registry = Some(ActiveRegistry::Shared(shared));
        }

        histogram!(metric_names::INGEST_ANALYSIS_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            analysis_id = %analysis_id,
            file = %file.display(),
            lines = line_count,
            parse_errors = self.parse_error_count(),
            rejected = self.rejected_count(),
            appended = self.appended_count(),
            destinations = self.destination_count(),
            "analysis complete"
        );
        Ok(())
    }

    /// 누적된 버퍼를 전부 플러시하고 레지스트리를 해제합니다.
    ///
    /// 모든 목적지의 플러시를 시도하며, 하나라도 실패하면 첫 에러를
    /// 반환합니다. 활성 분석이 없으면 경고만 남기고 정상 반환합니다.
    async fn free(&mut self, file: &'p Path) -> Result<(), GranaryError> {
        match self.registry.take() {
            None => {
                warn!(file = %file.display(), "free called without an active analysis");
                Ok(())
            }
            Some(ActiveRegistry::Serial(mut registry)) => {
                let destinations = registry.len();
                self.pool
                    .run(move || registry.flush_all())
                    .await
                    .map_err(GranaryError::Pool)?
                    .map_err(GranaryError::Append)?;
                info!(file = %file.display(), destinations, "flushed all destinations");
                Ok(())
            }
            Some(ActiveRegistry::Shared(registry)) => {
                let destinations = registry.len();
                self.pool
                    .run(move || registry.flush_all())
                    .await
                    .map_err(GranaryError::Pool)?
                    .map_err(GranaryError::Append)?;
                info!(file = %file.display(), destinations, "flushed all destinations");
                Ok(())
            }
        }
    }
}

/// 소스 분석기 빌더
///
/// 라인 파서와 필터를 등록하고, 필터 평가 순서를 빌드 시점에 한 번
/// 확정합니다.
pub struct SourceAnalystBuilder<R: Record> {
    config: AnalystConfig,
    parser: Option<Arc<dyn LineParser<R>>>,
    filters: FilterChainBuilder<R>,
    pool: Option<Arc<WorkerPool>>,
}

impl<R: Record> SourceAnalystBuilder<R> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: AnalystConfig::default(),
            parser: None,
            filters: FilterChainBuilder::new(),
            pool: None,
        }
    }

    /// 분석기 설정을 지정합니다.
    pub fn config(mut self, config: AnalystConfig) -> Self {
        self.config = config;
        self
    }

    /// 라인 파서를 등록합니다 (필수).
    pub fn parser(mut self, parser: Arc<dyn LineParser<R>>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// 우선순위 없이 필터를 등록합니다 (마지막에 평가).
    pub fn filter(mut self, filter: Arc<dyn RecordFilter<R>>) -> Self {
        self.filters = self.filters.register(filter);
        self
    }

    /// 우선순위와 함께 필터를 등록합니다. 낮은 값이 먼저 평가됩니다.
    pub fn filter_with_priority(mut self, filter: Arc<dyn RecordFilter<R>>, priority: u32) -> Self {
        self.filters = self.filters.register_with_priority(filter, priority);
        self
    }

    /// 외부에서 소유한 워커 풀을 주입합니다.
    ///
    /// 지정하지 않으면 설정의 워커 수로 새 풀을 생성합니다. 여러
    /// 분석기가 하나의 프로세스 전역 풀을 공유하려면 같은 `Arc`를
    /// 전달합니다.
    pub fn pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// 설정을 검증하고 분석기를 생성합니다.
    pub fn build(self) -> Result<SourceAnalyst<R>, IngestError> {
        self.config.validate()?;
        let parser = self
            .parser
            .ok_or_else(|| IngestError::MissingComponent("line parser".to_owned()))?;
        let pool = self
            .pool
            .unwrap_or_else(|| Arc::new(WorkerPool::new(self.config.workers)));
        // 필터 평가 순서는 여기서 한 번 확정된다
        let chain = Arc::new(self.filters.build());
        Ok(SourceAnalyst {
            config: self.config,
            parser,
            chain,
            pool,
            registry: None,
            stats: IngestStats::default(),
        })
    }
}

impl<R: Record> Default for SourceAnalystBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
