//! 워커 풀 — 파일 분석 전반에서 재사용되는 유한 블로킹 작업 풀
//!
//! [`WorkerPool`]은 프로세스 전역에서 한 번 생성해 `Arc`로 공유하는
//! 명시적 소유 리소스입니다. 숨은 정적 풀이 아니라 주입되는 값이며,
//! `close`로 수명을 끝냅니다.
//!
//! 작업은 tokio의 블로킹 풀에서 실행되고, 세마포어가 동시 실행 수를
//! `workers`로 제한합니다. [`PoolHandle::join`]이 개별 작업의 완료
//! 대기 지점이며, 패닉과 취소는 [`PoolError`]로 변환되어 전파됩니다.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::PoolError;

/// 유한 워커 풀
pub struct WorkerPool {
    workers: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// `workers`개의 동시 실행 슬롯을 가진 풀을 생성합니다 (최소 1).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// 동시 실행 슬롯 수를 반환합니다.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 블로킹 작업을 제출하고 핸들을 반환합니다.
    ///
    /// 슬롯이 모두 사용 중이면 작업은 슬롯이 빌 때까지 대기열에 남습니다.
    pub fn spawn<F, T>(&self, task: F) -> PoolHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?;
            tokio::task::spawn_blocking(task).await.map_err(join_error)
        });
        PoolHandle { handle }
    }

    /// 블로킹 작업을 제출하고 완료까지 대기합니다.
    pub async fn run<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn(task).join().await
    }

    /// 풀을 닫습니다. 이후 제출되는 작업은 [`PoolError::Closed`]로
    /// 실패하며, 이미 실행 중인 작업은 끝까지 수행됩니다.
    pub fn close(&self) {
        self.permits.close();
    }

    /// 풀이 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// 제출된 작업 하나의 완료 핸들
pub struct PoolHandle<T> {
    handle: JoinHandle<Result<T, PoolError>>,
}

impl<T> PoolHandle<T> {
    /// 작업 완료를 대기합니다.
    ///
    /// 작업이 패닉하면 [`PoolError::Panicked`]로, 런타임 종료 등으로
    /// 취소되면 [`PoolError::Cancelled`]로 변환됩니다.
    pub async fn join(self) -> Result<T, PoolError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(join_error(e)),
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> PoolError {
    if e.is_panic() {
        PoolError::Panicked(e.to_string())
    } else {
        PoolError::Cancelled
    }
}
