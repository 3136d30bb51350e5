mod error;
mod nginx;
mod orchestrator;
mod resolver;
mod scheduler;

pub use error::{Error, Result};
pub use nginx::{PlannedPatch, plan_patch, write_patch};
pub use orchestrator::{DomainOutcome, RenewalConfig, RenewalOrchestrator, Trigger};
pub use resolver::{ChallengeResolver, Resolution};
pub use scheduler::{RecheckRequest, SchedulerHandle, run_scheduler, scheduler_channel};
