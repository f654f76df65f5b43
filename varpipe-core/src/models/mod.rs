pub mod alignment;
pub mod job;
pub mod variant;
