//! 목적지 레지스트리 — 파일 분석 1회 범위의 어펜더 소유자
//!
//! 레지스트리는 목적지 경로를 키로 어펜더를 보관합니다. 어펜더는
//! 해당 목적지의 첫 레코드에서 lazy 생성되며 (insert-if-absent),
//! `flush_all`이 전부 플러시한 뒤 레지스트리를 비웁니다.
//! 파일 분석마다 새 레지스트리를 만들므로 파일 간 경합이 없습니다.
//!
//! 직렬 모드는 [`SerialRegistry`], 병렬 모드는 [`SharedRegistry`]를
//! 사용합니다.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::error;

use granary_core::appender::{ConcurrentCsvAppender, CsvAppender};
use granary_core::error::AppendError;

/// 직렬 모드 레지스트리 (단일 쓰기 스레드 전용)
#[derive(Default)]
pub struct SerialRegistry {
    map: HashMap<PathBuf, CsvAppender>,
}

impl SerialRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 목적지 어펜더를 가져오거나, 없으면 생성합니다.
    pub fn obtain(&mut self, path: PathBuf, header: &str, max_lines: usize) -> &mut CsvAppender {
        self.map
            .entry(path)
            .or_insert_with_key(|path| CsvAppender::new(path.clone(), header, max_lines))
    }

    /// 현재 보유한 목적지 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 목적지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 모든 어펜더를 정확히 한 번씩 플러시하고 레지스트리를 비웁니다.
    ///
    /// 일부 목적지가 실패해도 나머지를 전부 시도한 뒤 첫 에러를
    /// 반환합니다.
    pub fn flush_all(&mut self) -> Result<(), AppendError> {
        let mut first_error = None;
        for (path, mut appender) in self.map.drain() {
            if let Err(e) = appender.flush() {
                error!(path = %path.display(), error = %e, "failed to flush destination");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// 병렬 모드 레지스트리 (여러 청크 워커가 공유)
///
/// 어펜더 생성은 맵 잠금 아래의 insert-if-absent로 원자적이며,
/// 생성 이후의 add/flush는 각 어펜더 자체 잠금으로 직렬화됩니다.
#[derive(Default)]
pub struct SharedRegistry {
    map: Mutex<HashMap<PathBuf, Arc<ConcurrentCsvAppender>>>,
}

impl SharedRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 목적지 어펜더를 가져오거나, 없으면 생성합니다 (insert-if-absent).
    pub fn obtain(
        &self,
        path: PathBuf,
        header: &str,
        max_lines: usize,
    ) -> Arc<ConcurrentCsvAppender> {
        let mut map = self.lock();
        Arc::clone(map.entry(path).or_insert_with_key(|path| {
            Arc::new(ConcurrentCsvAppender::new(path.clone(), header, max_lines))
        }))
    }

    /// 현재 보유한 목적지 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 목적지가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 모든 어펜더를 정확히 한 번씩 플러시하고 레지스트리를 비웁니다.
    ///
    /// 완료 배리어 이후에 호출되므로 어펜더 경합은 없지만, 맵 잠금은
    /// 드레인까지만 잡고 플러시는 잠금 밖에서 수행합니다.
    pub fn flush_all(&self) -> Result<(), AppendError> {
        let drained: Vec<(PathBuf, Arc<ConcurrentCsvAppender>)> = self.lock().drain().collect();

        let mut first_error = None;
        for (path, appender) in drained {
            if let Err(e) = appender.flush() {
                error!(path = %path.display(), error = %e, "failed to flush destination");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<ConcurrentCsvAppender>>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_obtain_reuses_existing_appender() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.csv");
        let mut registry = SerialRegistry::new();

        registry
            .obtain(path.clone(), "h", 100)
            .add("1".to_owned())
            .unwrap();
        registry
            .obtain(path.clone(), "h", 100)
            .add("2".to_owned())
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.obtain(path, "h", 100).buffered(), 2);
    }

    #[test]
    fn serial_flush_all_writes_and_empties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.csv");
        let mut registry = SerialRegistry::new();
        registry
            .obtain(path.clone(), "h", 100)
            .add("row".to_owned())
            .unwrap();

        registry.flush_all().unwrap();
        assert!(registry.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "h\nrow\n");
    }

    #[test]
    fn serial_flush_all_attempts_every_destination() {
        let dir = tempfile::tempdir().unwrap();
        // 첫 목적지는 생성 불가능한 경로 (파일 아래의 하위 경로)
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let bad = blocker.join("sub/bad.csv");
        let good = dir.path().join("good.csv");

        let mut registry = SerialRegistry::new();
        registry
            .obtain(bad, "h", 100)
            .add("lost".to_owned())
            .unwrap();
        registry
            .obtain(good.clone(), "h", 100)
            .add("kept".to_owned())
            .unwrap();

        // 에러는 반환하되 나머지 목적지는 기록되어야 함
        assert!(registry.flush_all().is_err());
        assert!(registry.is_empty());
        assert_eq!(std::fs::read_to_string(&good).unwrap(), "h\nkept\n");
    }

    #[test]
    fn shared_obtain_is_insert_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.csv");
        let registry = SharedRegistry::new();

        let a = registry.obtain(path.clone(), "h", 100);
        let b = registry.obtain(path, "h", 100);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shared_flush_all_writes_and_empties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.csv");
        let registry = SharedRegistry::new();
        registry
            .obtain(path.clone(), "h", 100)
            .add("row".to_owned())
            .unwrap();

        registry.flush_all().unwrap();
        assert!(registry.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "h\nrow\n");
    }
}
