use anyhow::Result;
use goj_core::domain::{SubmissionId, SubmissionStatus};
use serde::Serialize;
use tokio::sync::broadcast;

/// 判题过程中对外广播的事件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JudgeEvent {
    /// 准入检查通过，开始运行测试用例。
    JobStarted {
        submission_id: SubmissionId,
        /// 测试用例数量。
        cases: usize,
        /// 本次提交的并行上限。
        parallelism: usize,
    },
    /// 单个测试用例结束。
    CaseFinished {
        submission_id: SubmissionId,
        index: usize,
        status: SubmissionStatus,
    },
    /// 最终结果已确定。
    VerdictReached {
        submission_id: SubmissionId,
        status: SubmissionStatus,
        message: String,
    },
}

/// 基于 `tokio::broadcast` 的事件广播器。没有订阅者时事件被丢弃。
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<JudgeEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: JudgeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Debug)]
pub struct EventStream {
    receiver: broadcast::Receiver<JudgeEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Result<JudgeEvent> {
        Ok(self.receiver.recv().await?)
    }

    pub fn try_recv(&mut self) -> Result<JudgeEvent> {
        Ok(self.receiver.try_recv()?)
    }
}
