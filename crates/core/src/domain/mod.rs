mod error;
mod ids;
mod judge;
mod limits;
mod submission;
mod submission_status;
mod test_case;

pub use error::DomainError;
pub use ids::{ProblemId, SubmissionId, TestCaseId, UserId};
pub use judge::{CaseReport, Judge, JudgeFailure, JudgeReport, JudgeRequest, SourceCode};
pub use limits::ProblemLimits;
pub use submission::Submission;
pub use submission_status::SubmissionStatus;
pub use test_case::TestCase;
