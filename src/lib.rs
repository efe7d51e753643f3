pub mod capabilities;
pub mod cli;
pub mod config;
pub mod interpreter;
pub mod registry;

// Re-export main types
pub use interpreter::{Context, Interpreter, Plan, RunReport, Step};
pub use registry::StepRegistry;
