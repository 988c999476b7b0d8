//! 判题结果汇总。
//!
//! 每个测试用例占用结果集中的一个固定槽位。所有用例结束（或看门狗触发）后，
//! 按固定优先级一次性给出最终结果，与各用例完成的先后顺序无关。

use goj_core::domain::{CaseReport, JudgeReport, SubmissionStatus};
use tracing::{info, warn};

use crate::runner::{ExecutionOutcome, RunReport};

pub const MSG_ACCEPTED: &str = "答案正确";
pub const MSG_WRONG_ANSWER: &str = "答案错误";
pub const MSG_TIME_LIMIT: &str = "运行超时";
pub const MSG_MEMORY_LIMIT: &str = "运行超内存";
pub const MSG_COMPILE_ERROR: &str = "编译错误";
pub const MSG_COMPILE_TIMEOUT: &str = "编译超时";
pub const MSG_INVALID_CODE: &str = "无效代码：包含非法操作或关键字";
pub const MSG_NO_CASES: &str = "无测试用例，默认正确";
pub const MSG_INDETERMINATE: &str = "部分测试用例未通过或未知错误";
pub const MSG_WATCHDOG: &str = "判题系统总超时";

/// 一次提交的结果集，长度等于测试用例数量。
#[derive(Debug)]
pub struct ResultAggregator {
    slots: Vec<Option<RunReport>>,
}

impl ResultAggregator {
    pub fn new(cases: usize) -> Self {
        Self {
            slots: vec![None; cases],
        }
    }

    /// 记录一个用例的结果。同一槽位只接受第一次写入。
    pub fn record(&mut self, index: usize, report: RunReport) {
        match self.slots.get_mut(index) {
            Some(slot @ None) => *slot = Some(report),
            Some(Some(_)) => warn!(case = index, "duplicate result ignored"),
            None => warn!(case = index, cases = self.slots.len(), "result for unknown case ignored"),
        }
    }

    pub fn passed(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|report| report.outcome == ExecutionOutcome::Accepted)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// 给出最终结果。
    ///
    /// 优先级：编译错误 > 超时 > 答案错误（含运行时错误）> 超内存 > 全部通过。
    /// 看门狗触发时仍为空的槽位按超时计。
    pub fn resolve(self, watchdog_fired: bool) -> JudgeReport {
        let missing = self.slots.iter().filter(|slot| slot.is_none()).count();
        let passed = self.passed();
        let total = self.slots.len();

        let worst = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|report| (index, report)))
            .filter(|(_, report)| report.outcome != ExecutionOutcome::Accepted)
            .max_by(|(a_index, a), (b_index, b)| {
                a.outcome
                    .status()
                    .priority()
                    .cmp(&b.outcome.status().priority())
                    // lowest index wins among equals
                    .then(b_index.cmp(a_index))
            })
            .map(|(_, report)| report.outcome.clone());

        let watchdog_timeout = watchdog_fired && missing > 0;
        let (status, message) = match worst {
            Some(ExecutionOutcome::CompileFailure { stderr }) => (
                SubmissionStatus::CompileError,
                if stderr.is_empty() {
                    MSG_COMPILE_ERROR.to_string()
                } else {
                    stderr
                },
            ),
            Some(ExecutionOutcome::Timeout) => {
                (SubmissionStatus::TimeLimitExceeded, MSG_TIME_LIMIT.to_string())
            }
            _ if watchdog_timeout => (SubmissionStatus::TimeLimitExceeded, MSG_WATCHDOG.to_string()),
            Some(outcome) => match outcome.status() {
                SubmissionStatus::MemoryLimitExceeded => {
                    (SubmissionStatus::MemoryLimitExceeded, MSG_MEMORY_LIMIT.to_string())
                }
                _ => (SubmissionStatus::WrongAnswer, MSG_WRONG_ANSWER.to_string()),
            },
            None if missing == 0 => (SubmissionStatus::Accepted, MSG_ACCEPTED.to_string()),
            None => (SubmissionStatus::WrongAnswer, MSG_INDETERMINATE.to_string()),
        };

        let cases: Vec<CaseReport> = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| case_report(index, slot.as_ref(), watchdog_fired))
            .collect();
        let runtime_ms = cases.iter().filter_map(|case| case.runtime_ms).max();
        let memory_kb = cases.iter().filter_map(|case| case.memory_kb).max();

        info!(
            status = ?status,
            passed,
            total,
            missing,
            watchdog_fired,
            "verdict resolved"
        );

        JudgeReport {
            status,
            message,
            cases,
            runtime_ms,
            memory_kb,
        }
    }
}

fn case_report(index: usize, slot: Option<&RunReport>, watchdog_fired: bool) -> CaseReport {
    match slot {
        Some(report) => CaseReport {
            index,
            status: report.outcome.status(),
            runtime_ms: Some(report.elapsed.as_millis() as u64),
            memory_kb: Some(report.memory_kb),
            detail: report.outcome.diagnostic().map(str::to_string),
        },
        None => CaseReport {
            index,
            status: if watchdog_fired {
                SubmissionStatus::TimeLimitExceeded
            } else {
                SubmissionStatus::Pending
            },
            runtime_ms: None,
            memory_kb: None,
            detail: None,
        },
    }
}

pub fn invalid_code() -> JudgeReport {
    JudgeReport::verdict(SubmissionStatus::InvalidCode, MSG_INVALID_CODE)
}

pub fn compile_error(stderr: String) -> JudgeReport {
    if stderr.trim().is_empty() {
        JudgeReport::verdict(SubmissionStatus::CompileError, MSG_COMPILE_ERROR)
    } else {
        JudgeReport::verdict(SubmissionStatus::CompileError, stderr)
    }
}

pub fn compile_timeout() -> JudgeReport {
    JudgeReport::verdict(SubmissionStatus::CompileError, MSG_COMPILE_TIMEOUT)
}

pub fn no_cases() -> JudgeReport {
    JudgeReport::verdict(SubmissionStatus::Accepted, MSG_NO_CASES)
}
