//! Grade records: entity, payload validation and summary statistics.

pub mod stats;
pub mod types;

pub use stats::{summarize, ScoreSummary};
pub use types::{FieldErrors, Grade, GradeChanges, GradeId, GradePayload, NewGrade};
