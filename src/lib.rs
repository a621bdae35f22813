pub mod client;
pub mod error;
pub mod load;
pub mod parser;
pub mod report;
pub mod runner;
pub mod token;
pub mod utils;

// Re-export common items
pub use error::{HarnessError, HarnessResult};
pub use load::run_load;
pub use report::generate_report;
pub use runner::run_functional;
