// src/services/mod.rs

//! Database-free core: selection, test assembly and result analysis.

pub mod analysis;
pub mod assembly;
pub mod selection;
