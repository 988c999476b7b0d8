use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    CompileError,
    InvalidCode,
}

impl SubmissionStatus {
    pub const TERMINAL: [SubmissionStatus; 6] = [
        SubmissionStatus::Accepted,
        SubmissionStatus::WrongAnswer,
        SubmissionStatus::TimeLimitExceeded,
        SubmissionStatus::MemoryLimitExceeded,
        SubmissionStatus::CompileError,
        SubmissionStatus::InvalidCode,
    ];

    pub fn is_terminal(self) -> bool {
        self != SubmissionStatus::Pending
    }

    pub fn is_accepted(self) -> bool {
        self == SubmissionStatus::Accepted
    }

    /// The snake_case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::WrongAnswer => "wrong_answer",
            SubmissionStatus::TimeLimitExceeded => "time_limit_exceeded",
            SubmissionStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            SubmissionStatus::CompileError => "compile_error",
            SubmissionStatus::InvalidCode => "invalid_code",
        }
    }

    /// Rank used when several failures arrive for one submission; higher wins.
    ///
    /// InvalidCode > CompileError > TimeLimitExceeded > WrongAnswer > MemoryLimitExceeded > Accepted.
    pub fn priority(self) -> u8 {
        match self {
            SubmissionStatus::InvalidCode => 6,
            SubmissionStatus::CompileError => 5,
            SubmissionStatus::TimeLimitExceeded => 4,
            SubmissionStatus::WrongAnswer => 3,
            SubmissionStatus::MemoryLimitExceeded => 2,
            SubmissionStatus::Accepted => 1,
            SubmissionStatus::Pending => 0,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(SubmissionStatus::Pending)
            .chain(SubmissionStatus::TERMINAL)
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}
