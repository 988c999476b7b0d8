pub mod problem_repository;
pub mod submission_repository;
pub mod user_repository;

pub use problem_repository::{NewProblem, ProblemRecord, ProblemRepository, SeaOrmProblemRepository};
pub use submission_repository::{
    SeaOrmSubmissionRepository, SubmissionFilter, SubmissionRecord, SubmissionRepository,
};
pub use user_repository::{NewUser, SeaOrmUserRepository, UserRecord, UserRepository};
