pub use crate::generator::{GenerateError, generate_distribution_cache};
pub use crate::options::GenerateOptions;

mod generator;
mod groups;
mod options;
