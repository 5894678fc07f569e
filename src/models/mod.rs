// src/models/mod.rs

pub mod pagination;
pub mod question;
pub mod result;
pub mod scope;
pub mod student;
pub mod test_paper;
