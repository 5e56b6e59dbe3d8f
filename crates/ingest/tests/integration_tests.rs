//! 통합 테스트 — 수집 파이프라인 전체 흐름 검증
//!
//! 이 파일은 파일 읽기부터 파싱, 필터, 라우팅, 플러시까지의
//! 전체 흐름을 검증합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use granary_core::analyst::{Analyst, LineParser};
use granary_core::error::GranaryError;
use granary_core::filter::{Policy, RecordFilter};
use granary_core::record::Record;
use granary_ingest::{
    AnalystConfig, AnalystConfigBuilder, JsonLineParser, JsonRecord, SourceAnalyst,
    SourceAnalystBuilder,
};

// 2024-01-01T09:30:00Z
const CAPTURE: i64 = 1_704_101_400_000;

fn make_parser() -> Arc<dyn LineParser<JsonRecord>> {
    Arc::new(JsonLineParser::new(
        vec!["src_ip", "dst_ip", "bytes"],
        "capture_time",
    ))
}

fn make_config(root: &Path) -> AnalystConfig {
    AnalystConfigBuilder::new()
        .warehouse_root(root)
        .node("n1")
        .module("core")
        .protocol("flow")
        .workers(4)
        .serial_threshold(200)
        .output_max_lines(1024)
        .build()
        .unwrap()
}

fn make_analyst(config: AnalystConfig) -> SourceAnalyst<JsonRecord> {
    SourceAnalystBuilder::new()
        .config(config)
        .parser(make_parser())
        .build()
        .unwrap()
}

fn capture_line(ts: i64, index: usize) -> String {
    format!(
        r#"{{"capture_time":{ts},"src_ip":"10.0.0.{index}","dst_ip":"192.168.0.1","bytes":{index}}}"#
    )
}

fn write_capture_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

/// 직렬 경로: 같은 분 버킷의 3개 라인이 단일 목적지 파일에
/// 헤더 + 입력 순서 그대로 기록되어야 함
#[tokio::test(flavor = "multi_thread")]
async fn serial_three_lines_single_destination() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    // 1. 입력 파일 작성 (3 라인, 전부 202401010930 버킷)
    let lines = vec![
        capture_line(CAPTURE, 0),
        capture_line(CAPTURE + 1_000, 1),
        capture_line(CAPTURE + 2_000, 2),
    ];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    // 2. 분석 + 플러시
    let mut analyst = make_analyst(make_config(&warehouse));
    analyst.analysis(&capture).await.unwrap();
    assert_eq!(analyst.destination_count(), 1);
    analyst.free(&capture).await.unwrap();

    // 3. 목적지 파일 검증
    let destination = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    let rows = read_lines(&destination);
    assert_eq!(
        rows,
        vec![
            "src_ip,dst_ip,bytes",
            "10.0.0.0,192.168.0.1,0",
            "10.0.0.1,192.168.0.1,1",
            "10.0.0.2,192.168.0.1,2",
        ]
    );

    // 4. 통계 검증
    assert_eq!(analyst.line_count(), 3);
    assert_eq!(analyst.appended_count(), 3);
    assert_eq!(analyst.parse_error_count(), 0);
    // free 이후 레지스트리는 비어 있어야 함
    assert_eq!(analyst.destination_count(), 0);
}

/// 병렬 경로: 전체 출력 행 집합이 파싱 성공 레코드 집합과 일치해야 함
/// (청크 간 순서는 보장되지 않음)
#[tokio::test(flavor = "multi_thread")]
async fn parallel_rows_match_parsed_set() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    // 1. 두 분 버킷에 걸친 120 라인 (짝수 -> 0930, 홀수 -> 0931)
    let lines: Vec<String> = (0..120)
        .map(|i| {
            let ts = if i % 2 == 0 { CAPTURE } else { CAPTURE + 60_000 };
            capture_line(ts, i)
        })
        .collect();
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    // 2. 병렬 모드 강제 (임계치를 라인 수보다 작게)
    let config = AnalystConfigBuilder::new()
        .warehouse_root(&warehouse)
        .node("n1")
        .module("core")
        .protocol("flow")
        .workers(4)
        .serial_threshold(10)
        .output_max_lines(16)
        .build()
        .unwrap();
    let mut analyst = make_analyst(config);
    analyst.analysis(&capture).await.unwrap();
    assert_eq!(analyst.destination_count(), 2);
    analyst.free(&capture).await.unwrap();

    // 3. 버킷별 파일 내용 = 해당 버킷 레코드 집합
    let first = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    let second = warehouse.join("csv/core/20240101/flow_202401010931.n1.csv");

    let mut even_rows: Vec<String> = read_lines(&first);
    assert_eq!(even_rows.remove(0), "src_ip,dst_ip,bytes");
    even_rows.sort();
    let mut expected_even: Vec<String> = (0..120)
        .filter(|i| i % 2 == 0)
        .map(|i| format!("10.0.0.{i},192.168.0.1,{i}"))
        .collect();
    expected_even.sort();
    assert_eq!(even_rows, expected_even);

    let mut odd_rows: Vec<String> = read_lines(&second);
    assert_eq!(odd_rows.remove(0), "src_ip,dst_ip,bytes");
    odd_rows.sort();
    let mut expected_odd: Vec<String> = (0..120)
        .filter(|i| i % 2 == 1)
        .map(|i| format!("10.0.0.{i},192.168.0.1,{i}"))
        .collect();
    expected_odd.sort();
    assert_eq!(odd_rows, expected_odd);

    // 4. 통계 검증
    assert_eq!(analyst.line_count(), 120);
    assert_eq!(analyst.appended_count(), 120);
    assert_eq!(analyst.chunk_failure_count(), 0);
}

/// 특정 캡처 시각의 레코드를 거부하는 필터
struct RejectAt {
    marker: i64,
}

impl RecordFilter<JsonRecord> for RejectAt {
    fn name(&self) -> &str {
        "reject_at"
    }

    fn accept(&self, record: &JsonRecord) -> bool {
        record.capture_time() != self.marker
    }

    fn policy(&self) -> Policy {
        Policy::Reject
    }
}

/// Reject 정책 필터가 거부한 레코드는 어떤 목적지에도 기록되지 않아야 함
#[tokio::test(flavor = "multi_thread")]
async fn reject_policy_drops_record() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    let lines = vec![
        capture_line(CAPTURE, 0),
        capture_line(CAPTURE + 1_000, 1), // 이 레코드만 거부됨
        capture_line(CAPTURE + 2_000, 2),
    ];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    let mut analyst = SourceAnalystBuilder::new()
        .config(make_config(&warehouse))
        .parser(make_parser())
        .filter_with_priority(
            Arc::new(RejectAt {
                marker: CAPTURE + 1_000,
            }),
            1,
        )
        .build()
        .unwrap();
    analyst.analysis(&capture).await.unwrap();
    analyst.free(&capture).await.unwrap();

    let destination = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    let rows = read_lines(&destination);
    assert_eq!(
        rows,
        vec![
            "src_ip,dst_ip,bytes",
            "10.0.0.0,192.168.0.1,0",
            "10.0.0.2,192.168.0.1,2",
        ]
    );
    assert_eq!(analyst.rejected_count(), 1);
    assert_eq!(analyst.appended_count(), 2);
}

/// 항상 거부하는 Stop 정책 필터
struct StopAll;

impl RecordFilter<JsonRecord> for StopAll {
    fn name(&self) -> &str {
        "stop_all"
    }

    fn accept(&self, _record: &JsonRecord) -> bool {
        false
    }

    fn policy(&self) -> Policy {
        Policy::Stop
    }
}

/// 평가 횟수를 세는 필터
struct CountingFilter {
    evaluations: Arc<AtomicUsize>,
}

impl RecordFilter<JsonRecord> for CountingFilter {
    fn name(&self) -> &str {
        "counting"
    }

    fn accept(&self, _record: &JsonRecord) -> bool {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Stop 정책은 순회만 중단한다: 레코드는 그대로 기록되고
/// 중단 지점 이후의 필터는 평가되지 않아야 함
#[tokio::test(flavor = "multi_thread")]
async fn stop_policy_appends_and_short_circuits() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    let lines = vec![capture_line(CAPTURE, 0), capture_line(CAPTURE, 1)];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    let evaluations = Arc::new(AtomicUsize::new(0));
    let mut analyst = SourceAnalystBuilder::new()
        .config(make_config(&warehouse))
        .parser(make_parser())
        .filter_with_priority(Arc::new(StopAll), 1)
        .filter_with_priority(
            Arc::new(CountingFilter {
                evaluations: Arc::clone(&evaluations),
            }),
            2,
        )
        .build()
        .unwrap();
    analyst.analysis(&capture).await.unwrap();
    analyst.free(&capture).await.unwrap();

    // Stop 이후의 필터는 한 번도 평가되지 않음
    assert_eq!(evaluations.load(Ordering::SeqCst), 0);

    // 레코드는 그대로 기록됨
    let destination = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    let rows = read_lines(&destination);
    assert_eq!(rows.len(), 3);
    assert_eq!(analyst.appended_count(), 2);
    assert_eq!(analyst.rejected_count(), 0);
}

/// 파싱 실패 라인은 건너뛰고 나머지는 정상 처리되어야 함
#[tokio::test(flavor = "multi_thread")]
async fn parse_errors_are_isolated_per_line() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    let lines = vec![
        capture_line(CAPTURE, 0),
        "this is not json".to_owned(),
        capture_line(CAPTURE, 1),
        r#"{"src_ip":"1.2.3.4"}"#.to_owned(), // capture_time 누락
        capture_line(CAPTURE, 2),
    ];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    let mut analyst = make_analyst(make_config(&warehouse));
    analyst.analysis(&capture).await.unwrap();
    analyst.free(&capture).await.unwrap();

    assert_eq!(analyst.line_count(), 5);
    assert_eq!(analyst.parse_error_count(), 2);
    assert_eq!(analyst.appended_count(), 3);

    let destination = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    assert_eq!(read_lines(&destination).len(), 4); // 헤더 + 3행
}

/// 빈 입력 파일은 경고만 남기고 출력 없이 정상 반환해야 함
#[tokio::test(flavor = "multi_thread")]
async fn empty_file_produces_no_output() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");
    let capture = write_capture_file(temp.path(), "empty.log", &[]);

    let mut analyst = make_analyst(make_config(&warehouse));
    analyst.analysis(&capture).await.unwrap();
    assert_eq!(analyst.destination_count(), 0);
    analyst.free(&capture).await.unwrap();

    assert!(!warehouse.join("csv").exists());
    assert_eq!(analyst.line_count(), 0);
}

/// 버퍼가 임계치에 도달하면 free 이전에도 자동 플러시되어야 함
#[tokio::test(flavor = "multi_thread")]
async fn auto_flush_happens_before_free() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    let lines = vec![
        capture_line(CAPTURE, 0),
        capture_line(CAPTURE, 1),
        capture_line(CAPTURE, 2),
    ];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    let config = AnalystConfigBuilder::new()
        .warehouse_root(&warehouse)
        .node("n1")
        .module("core")
        .protocol("flow")
        .workers(1)
        .serial_threshold(200)
        .output_max_lines(2)
        .build()
        .unwrap();
    let mut analyst = make_analyst(config);
    analyst.analysis(&capture).await.unwrap();

    // free 전: 임계치(2)에 도달한 행들은 이미 기록됨
    let destination = warehouse.join("csv/core/20240101/flow_202401010930.n1.csv");
    assert_eq!(read_lines(&destination).len(), 3); // 헤더 + 2행

    // free 후: 남은 1행까지 전부 기록됨
    analyst.free(&capture).await.unwrap();
    assert_eq!(read_lines(&destination).len(), 4);
}

/// 플러시 실패는 free 호출자에게 전파되어야 함 (무음 유실 금지)
#[tokio::test(flavor = "multi_thread")]
async fn flush_error_propagates_from_free() {
    let temp = tempfile::tempdir().unwrap();
    // 웨어하우스 루트를 일반 파일 아래 경로로 만들어 생성을 실패시킨다
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let warehouse = blocker.join("warehouse");

    let lines = vec![capture_line(CAPTURE, 0)];
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    let mut analyst = make_analyst(make_config(&warehouse));
    // 버퍼 임계치가 크므로 analysis 단계에서는 I/O가 발생하지 않음
    analyst.analysis(&capture).await.unwrap();

    let err = analyst.free(&capture).await.unwrap_err();
    assert!(matches!(err, GranaryError::Append(_)));
}

/// 병렬 모드의 청크 실패는 분석을 중단시키지 않고 기록만 되어야 함
#[tokio::test(flavor = "multi_thread")]
async fn chunk_failures_are_isolated() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let warehouse = blocker.join("warehouse");

    let lines: Vec<String> = (0..40).map(|i| capture_line(CAPTURE, i)).collect();
    let capture = write_capture_file(temp.path(), "capture.log", &lines);

    // 임계치 1로 모든 add가 즉시 플러시를 시도하게 만든다
    let config = AnalystConfigBuilder::new()
        .warehouse_root(&warehouse)
        .node("n1")
        .module("core")
        .protocol("flow")
        .workers(4)
        .serial_threshold(10)
        .output_max_lines(1)
        .build()
        .unwrap();
    let mut analyst = make_analyst(config);

    // 모든 청크가 첫 기록에서 실패하지만 analysis 자체는 성공한다
    analyst.analysis(&capture).await.unwrap();
    assert_eq!(analyst.chunk_failure_count(), 4);

    // 실패한 어펜더에 남은 행의 플러시도 실패하므로 free는 에러를 낸다
    assert!(analyst.free(&capture).await.is_err());
}

/// 연속된 파일 분석은 각각 독립된 레지스트리를 사용해야 함
#[tokio::test(flavor = "multi_thread")]
async fn sequential_files_use_fresh_registries() {
    let temp = tempfile::tempdir().unwrap();
    let warehouse = temp.path().join("warehouse");

    let first = write_capture_file(temp.path(), "first.log", &[capture_line(CAPTURE, 0)]);
    let second = write_capture_file(
        temp.path(),
        "second.log",
        &[capture_line(CAPTURE + 60_000, 1)],
    );

    let mut analyst = make_analyst(make_config(&warehouse));

    analyst.analysis(&first).await.unwrap();
    analyst.free(&first).await.unwrap();

    analyst.analysis(&second).await.unwrap();
    assert_eq!(analyst.destination_count(), 1);
    analyst.free(&second).await.unwrap();

    assert!(
        warehouse
            .join("csv/core/20240101/flow_202401010930.n1.csv")
            .exists()
    );
    assert!(
        warehouse
            .join("csv/core/20240101/flow_202401010931.n1.csv")
            .exists()
    );
}
