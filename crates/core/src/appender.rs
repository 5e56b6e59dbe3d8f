//! CSV 어펜더 — 목적지별 행 버퍼링 및 임계치 자동 플러시
//!
//! [`CsvAppender`]는 렌더링된 CSV 행을 인메모리에 모았다가 버퍼가
//! `max_lines`에 도달하면 동기적으로 목적지 파일에 기록합니다.
//! 전체 레코드 양과 무관하게 메모리 사용량이 `max_lines`로 제한됩니다.
//!
//! 목적지 파일은 첫 실제 기록 시점에 lazy 생성됩니다 (헤더 먼저 기록).
//! 수락된 레코드가 없는 목적지는 빈 출력 파일을 남기지 않습니다.
//!
//! [`ConcurrentCsvAppender`]는 동일 계약의 동기화 변형입니다. 여러 워커가
//! 같은 인스턴스에 `add`를 호출해도 버퍼 변경 + 임계치 확인 + 플러시가
//! 하나의 잠금 아래에서 원자적으로 수행됩니다.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::counter;

use crate::error::AppendError;
use crate::metrics as metric_names;

/// 단일 쓰기 스레드 전용 버퍼링 CSV 어펜더 (직렬 모드)
pub struct CsvAppender {
    path: PathBuf,
    header: String,
    max_lines: usize,
    rows: Vec<String>,
    out: Option<File>,
}

impl CsvAppender {
    /// 새 어펜더를 생성합니다. 목적지 파일은 아직 만들지 않습니다.
    pub fn new(path: impl Into<PathBuf>, header: impl Into<String>, max_lines: usize) -> Self {
        Self {
            path: path.into(),
            header: header.into(),
            max_lines: max_lines.max(1),
            rows: Vec::new(),
            out: None,
        }
    }

    /// 행을 버퍼에 추가합니다.
    ///
    /// 버퍼가 `max_lines`에 도달하면 즉시 목적지에 기록하고 버퍼를
    /// 비웁니다.
    pub fn add(&mut self, row: String) -> Result<(), AppendError> {
        self.rows.push(row);
        if self.rows.len() >= self.max_lines {
            self.write_buffered()?;
        }
        Ok(())
    }

    /// 버퍼에 남은 행을 전부 목적지에 기록합니다.
    ///
    /// 버퍼가 비어 있으면 아무것도 하지 않습니다 (멱등).
    pub fn flush(&mut self) -> Result<(), AppendError> {
        self.write_buffered()
    }

    /// 현재 버퍼에 있는 행 수를 반환합니다.
    pub fn buffered(&self) -> usize {
        self.rows.len()
    }

    /// 목적지 경로를 반환합니다.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 플러시 임계치를 반환합니다.
    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    fn write_buffered(&mut self) -> Result<(), AppendError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        if self.out.is_none() {
            self.out = Some(open_destination(&self.path, &self.header)?);
        }
        if let Some(out) = self.out.as_mut() {
            // 버퍼 전체를 한 번의 write로 목적지에 내린다
            let mut batch =
                String::with_capacity(self.rows.iter().map(|r| r.len() + 1).sum::<usize>());
            for row in &self.rows {
                batch.push_str(row);
                batch.push('\n');
            }
            let path = &self.path;
            out.write_all(batch.as_bytes())
                .map_err(|e| AppendError::Write {
                    path: path.display().to_string(),
                    source: e,
                })?;
        }
        counter!(metric_names::APPENDER_FLUSHES_TOTAL).increment(1);
        counter!(metric_names::APPENDER_ROWS_WRITTEN_TOTAL)
            .increment(u64::try_from(self.rows.len()).unwrap_or(u64::MAX));
        self.rows.clear();
        Ok(())
    }
}

/// 목적지 파일을 append 모드로 열고, 비어 있으면 헤더를 먼저 기록합니다.
fn open_destination(path: &Path, header: &str) -> Result<File, AppendError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppendError::Create {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppendError::Create {
            path: path.display().to_string(),
            source: e,
        })?;
    let needs_header = file
        .metadata()
        .map_err(|e| AppendError::Create {
            path: path.display().to_string(),
            source: e,
        })?
        .len()
        == 0;
    if needs_header {
        writeln!(file, "{header}").map_err(|e| AppendError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(file)
}

/// 동시 쓰기 안전 버퍼링 CSV 어펜더 (병렬 모드)
///
/// 내부 [`CsvAppender`]를 `Mutex`로 감싸 `add`의
/// 버퍼 변경 + 임계치 확인 + 플러시를 원자적으로 만듭니다.
/// 행 유실, 중복 플러시, 기록 교차가 발생하지 않습니다.
pub struct ConcurrentCsvAppender {
    inner: Mutex<CsvAppender>,
}

impl ConcurrentCsvAppender {
    /// 새 동시성 어펜더를 생성합니다.
    pub fn new(path: impl Into<PathBuf>, header: impl Into<String>, max_lines: usize) -> Self {
        Self {
            inner: Mutex::new(CsvAppender::new(path, header, max_lines)),
        }
    }

    /// 행을 버퍼에 추가합니다. 임계치 도달 시 잠금 아래에서 플러시합니다.
    pub fn add(&self, row: String) -> Result<(), AppendError> {
        self.lock().add(row)
    }

    /// 버퍼에 남은 행을 전부 기록합니다.
    pub fn flush(&self) -> Result<(), AppendError> {
        self.lock().flush()
    }

    /// 현재 버퍼에 있는 행 수를 반환합니다.
    pub fn buffered(&self) -> usize {
        self.lock().buffered()
    }

    /// 목적지 경로를 반환합니다.
    pub fn path(&self) -> PathBuf {
        self.lock().path().to_path_buf()
    }

    fn lock(&self) -> MutexGuard<'_, CsvAppender> {
        // poison 복구: 버퍼 변이는 단일 Vec 연산 단위라 패닉한 워커가
        // 버퍼를 반쯤 변경된 상태로 남기지 못한다
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
