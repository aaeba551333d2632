//! HTTP handlers

pub mod file;
pub mod health;
pub mod signed;
