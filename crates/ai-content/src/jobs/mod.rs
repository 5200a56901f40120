//! Job tracking: the domain model, request fingerprints, the persistent
//! job store and the tracker facade that coordinates them with providers.

pub mod fingerprint;
pub mod model;
pub mod store;
pub mod tracker;

pub use fingerprint::{fingerprint, Fingerprint};
pub use model::{ContentType, Job, JobStatus, JobUpdate, NewJob, ParseEnumError};
pub use store::{CreateOutcome, JobIter, JobQuery, JobStats, JobStore, StoreError};
pub use tracker::{
    JobTracker, SubmitOutcome, SyncOutcome, SyncReport, TrackerError, TrackerSettings,
};
