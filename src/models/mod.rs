//! Domain models and DTOs

pub mod problem;
pub mod submission;
pub mod user;

pub use problem::{ComparatorMode, Contest, GeneratorSpec, Problem, TestCase, ValidatorSpec};
pub use submission::{NewSubmission, Submission, SubmissionInfo, SubmissionStatus, TestCaseResult};
pub use user::{User, UserAction};
