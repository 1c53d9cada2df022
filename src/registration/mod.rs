//! SourceCred registration relay: chat intake, queue drain, table bookkeeping.

pub mod drain;
pub mod intake;
pub mod types;

pub use drain::{DrainError, DrainOptions, DrainReport, DrainWorker};
pub use intake::{parse_submission, Command, Intake, IntakeError, IntakeOptions, IntakeOutcome};
pub use types::{RegisteredUserRecord, RegistrationRequest};
