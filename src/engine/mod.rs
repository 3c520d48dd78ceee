mod checkpoint;
mod normalizer;
mod scheduler;
mod shutdown;
mod state;
mod worker;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{CheckpointReader, resume_point};
pub use normalizer::{NormalizeReport, RowParseError, normalize};
pub use scheduler::{Scheduler, StepOutcome};
pub use shutdown::Shutdown;
pub use state::{Phase, SchedulerState};
pub use worker::Feeder;
pub use writer::BatchWriter;
