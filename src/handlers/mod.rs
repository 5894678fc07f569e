// src/handlers/mod.rs

pub mod questions;
pub mod results;
pub mod scopes;
pub mod students;
pub mod test_papers;
