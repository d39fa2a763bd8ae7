pub mod pipeline;
pub mod types;

pub use pipeline::Pipeline;
pub use types::{RunReport, Stage, StageTimings};
