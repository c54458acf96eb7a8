//! Labeled dataset assembly, train/test splitting, and report writing for
//! the lumen pipeline.

mod assembler;
mod domain;
mod error;
mod writer;

pub use assembler::{Assembly, DatasetAssembler, DecodeFailurePolicy, SkippedFile};
pub use domain::{Dataset, ExperimentName, Sample, Split};
pub use error::IoError;
pub use writer::{BackendMetrics, ReportWriter, RunSummary};
