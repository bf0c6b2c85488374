pub mod artifact;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod runner;


pub use error::{FailureKind, PipelineError};
pub use pipeline::ExecutionPipeline;
pub use registry::{CommandSpec, LanguageRegistry};
