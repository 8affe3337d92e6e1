pub mod cli;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod schema;
pub mod types;

// Re-export main types
pub use types::*;

// Re-export the pipeline entry points for convenience
pub use error::{ErrorCode, HrfError};
pub use interpreter::{execute, run_envelope, ExecutionResult, Executor};
pub use parser::semantic_validator::{validate_for_hrf, Validator, ValidatorOptions};
pub use parser::{parse, render, FormatError};
pub use schema::{JsonSchemaValidator, SchemaValidator};
