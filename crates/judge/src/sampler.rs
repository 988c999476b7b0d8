//! 内存用量采样。
//!
//! 所有数值单位均为 KB。

use std::fs;
use std::sync::Arc;

use nix::unistd::{SysconfVar, sysconf};
use tracing::debug;

use crate::config::SamplerKind;

/// 在一次运行前后（以及运行期间）采样内存用量。
pub trait ResourceSampler: Send + Sync {
    fn name(&self) -> &str;

    /// 子进程启动前调用，返回基线。
    fn begin(&self) -> u64;

    /// 子进程运行期间周期性调用，返回该进程组当前的用量。
    /// 不跟踪子进程的实现返回 `None`。可能阻塞（读取 procfs），调用方应放在阻塞线程池中执行。
    fn observe(&self, pgid: u32) -> Option<u64>;

    /// 子进程结束后调用，给出本次运行计入的用量。
    fn finish(&self, baseline: u64, peak: Option<u64>) -> u64;
}

/// `unmetered` 只对进程组采样器生效。
pub fn build_sampler(kind: SamplerKind, unmetered: &[String]) -> Arc<dyn ResourceSampler> {
    match kind {
        SamplerKind::Supervisor => Arc::new(SupervisorSampler::new()),
        SamplerKind::ProcessGroup => {
            Arc::new(ProcessGroupSampler::new().with_unmetered(unmetered.iter().cloned()))
        }
    }
}

/// The kernel keeps at most this many bytes of a process name in `comm`.
const COMM_LEN: usize = 15;

fn page_kb() -> u64 {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(bytes)) if bytes > 0 => (bytes as u64 / 1024).max(1),
        _ => 4,
    }
}

/// 判题进程自身常驻内存的前后差值。
///
/// 只是近似值：反映的是判题进程而不是被测程序的内存，
/// 并发运行的用例还会互相干扰。保留用于与旧行为对照。
#[derive(Debug, Clone)]
pub struct SupervisorSampler {
    page_kb: u64,
}

impl SupervisorSampler {
    pub fn new() -> Self {
        Self { page_kb: page_kb() }
    }

    fn resident_kb(&self) -> u64 {
        let statm = match fs::read_to_string("/proc/self/statm") {
            Ok(statm) => statm,
            Err(err) => {
                debug!(error = %err, "failed to read /proc/self/statm");
                return 0;
            }
        };

        statm
            .split_whitespace()
            .nth(1)
            .and_then(|pages| pages.parse::<u64>().ok())
            .map_or(0, |pages| pages * self.page_kb)
    }
}

impl Default for SupervisorSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SupervisorSampler {
    fn name(&self) -> &str {
        "supervisor"
    }

    fn begin(&self) -> u64 {
        self.resident_kb()
    }

    fn observe(&self, _pgid: u32) -> Option<u64> {
        None
    }

    fn finish(&self, baseline: u64, _peak: Option<u64>) -> u64 {
        self.resident_kb().saturating_sub(baseline)
    }
}

/// 被测进程组的常驻内存峰值。
///
/// 运行期间汇总 `/proc/<pid>/stat` 中 pgrp 等于子进程组的所有进程的 rss，
/// 因此 `go run` 派生出的实际程序也会被计入。进程名在 `unmetered` 中的进程
/// （工具链自身）不计入。采样间隔内的瞬时峰值可能漏记。
#[derive(Debug, Clone)]
pub struct ProcessGroupSampler {
    page_kb: u64,
    unmetered: Vec<String>,
}

impl ProcessGroupSampler {
    pub fn new() -> Self {
        Self {
            page_kb: page_kb(),
            unmetered: Vec::new(),
        }
    }

    pub fn with_unmetered(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.unmetered = names
            .into_iter()
            .map(|mut name| {
                let mut cut = name.len().min(COMM_LEN);
                while !name.is_char_boundary(cut) {
                    cut -= 1;
                }
                name.truncate(cut);
                name
            })
            .collect();
        self
    }

    fn is_metered(&self, comm: &str) -> bool {
        !self.unmetered.iter().any(|name| name == comm)
    }

    fn group_resident_kb(&self, pgid: u32) -> Option<u64> {
        let entries = match fs::read_dir("/proc") {
            Ok(entries) => entries,
            Err(err) => {
                debug!(error = %err, "procfs unavailable, memory is not sampled");
                return None;
            }
        };

        let mut total = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            // The process may exit between listing and reading.
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            if let Some(ProcStat { comm, group, rss_pages }) = parse_stat(&stat)
                && group == pgid
                && self.is_metered(comm)
            {
                *total.get_or_insert(0) += rss_pages * self.page_kb;
            }
        }
        total
    }
}

impl Default for ProcessGroupSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for ProcessGroupSampler {
    fn name(&self) -> &str {
        "process_group"
    }

    fn begin(&self) -> u64 {
        0
    }

    fn observe(&self, pgid: u32) -> Option<u64> {
        self.group_resident_kb(pgid)
    }

    fn finish(&self, _baseline: u64, peak: Option<u64>) -> u64 {
        peak.unwrap_or(0)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ProcStat<'a> {
    comm: &'a str,
    group: u32,
    rss_pages: u64,
}

/// Fields of interest from a `/proc/<pid>/stat` line.
fn parse_stat(stat: &str) -> Option<ProcStat<'_>> {
    // comm may contain spaces and parentheses; fields resume after the last ')'.
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let comm = stat.get(open + 1..close)?;
    let fields: Vec<&str> = stat[close + 1..].split_whitespace().collect();
    Some(ProcStat {
        comm,
        group: fields.get(2)?.parse().ok()?,
        rss_pages: fields.get(21)?.parse().ok()?,
    })
}
