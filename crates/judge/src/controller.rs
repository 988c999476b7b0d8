use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::error::{JudgeError, Result};
use crate::runner::RunReport;

/// 一个测试用例任务的完成结果。
#[derive(Debug)]
pub struct Completion {
    pub index: usize,
    pub result: Result<RunReport>,
}

/// 单次提交内的并发控制器。
///
/// 由信号量限制同时运行的用例数量。许可证随任务结束（正常返回、出错或 panic）一起释放，
/// 每个任务恰好产出一个 [`Completion`]。控制器被丢弃时，尚未结束的任务全部中止。
pub struct ConcurrencyController {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<Completion>,
    gauge: Arc<Gauge>,
    bound: usize,
}

impl ConcurrencyController {
    pub fn new(bound: usize) -> Self {
        let bound = bound.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(bound)),
            tasks: JoinSet::new(),
            gauge: Arc::new(Gauge::default()),
            bound,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// 当前持有许可证的任务数。
    pub fn in_flight(&self) -> usize {
        self.gauge.current.load(Ordering::SeqCst)
    }

    /// 观察到的最大并发数。
    pub fn peak(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    pub fn spawn<F>(&mut self, index: usize, work: F)
    where
        F: Future<Output = Result<RunReport>> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let gauge = self.gauge.clone();

        self.tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    return Completion {
                        index,
                        result: Err(JudgeError::TaskAborted(format!("semaphore closed: {err}"))),
                    };
                }
            };
            let _slot = gauge.enter();

            // The work stays inside this task, so aborting the task drops the work with it.
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    error!(case = index, panic = panic_message(&*panic), "judge task panicked");
                    Err(JudgeError::TaskAborted(format!("case {index} panicked")))
                }
            };

            Completion { index, result }
        });
    }

    /// 等待下一个完成的任务；全部完成后返回 `None`。
    pub async fn next_completion(&mut self) -> Option<Result<Completion>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(|err| {
            error!(error = %err, "judge task wrapper failed");
            JudgeError::TaskAborted(err.to_string())
        }))
    }

    /// 中止所有尚未完成的任务，返回时它们的子进程均已被终止。
    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
    }
}

#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(self: &Arc<Self>) -> GaugeSlot {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeSlot(self.clone())
    }
}

struct GaugeSlot(Arc<Gauge>);

impl Drop for GaugeSlot {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
