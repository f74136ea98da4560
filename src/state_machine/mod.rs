mod job;
mod state;

pub use job::{AccountFailure, AccountIdentity, AccountMap, FailureReason, JobAudit, JobRecord};
pub use state::{JobState, Observation, StateMachine, Transition};
