pub use env_vars::*;

mod env_vars;
