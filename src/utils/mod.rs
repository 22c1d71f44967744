//! Small helpers shared by the services: path handling, input validation,
//! and retry with exponential backoff.

pub mod files;
pub mod retry;
pub mod validation;
