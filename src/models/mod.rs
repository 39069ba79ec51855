pub mod job;
pub mod task;
pub mod user;

pub use job::{parse_jobs, GenericJob, JobId, JobRecord, ListedJob, RecommendedJob};
pub use task::{
    SubmitOutcome, SubmitRequest, SubmitResponse, TaskId, TaskKind, TaskState, TaskStatus,
    TaskStatusResponse,
};
pub use user::CurrentUser;
