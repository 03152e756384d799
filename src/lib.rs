pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod validate;

pub use pipeline::diag::{codes, Diagnostic, JobCounts};
pub use pipeline::{run_job, JobFailure, JobOutput, JobResult};
pub use validate::CountryMap;
