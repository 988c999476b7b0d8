use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemLimits {
    max_runtime_ms: u64,
    max_memory_kb: u64,
}

impl ProblemLimits {
    pub fn new(max_runtime_ms: u64, max_memory_kb: u64) -> Result<Self, DomainError> {
        if max_runtime_ms == 0 {
            return Err(DomainError::InvalidLimits { max_runtime_ms });
        }

        Ok(Self {
            max_runtime_ms,
            max_memory_kb,
        })
    }

    pub fn max_runtime_ms(&self) -> u64 {
        self.max_runtime_ms
    }

    pub fn max_memory_kb(&self) -> u64 {
        self.max_memory_kb
    }

    pub fn runtime(&self) -> Duration {
        Duration::from_millis(self.max_runtime_ms)
    }
}
