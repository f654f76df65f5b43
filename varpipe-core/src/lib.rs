//! Core data model for the varpipe job pipeline.
//!
//! Everything here is plain data: job records, alignment results, called
//! variants, and annotated variants, plus the pure helpers shared by the
//! service crates (chromosome-label extraction and clinical-significance
//! normalization). No I/O happens in this crate.

pub mod chromosome;
pub mod models;
pub mod significance;

pub use models::alignment::{AlignmentHit, AlignmentResult};
pub use models::job::{Job, JobStatus};
pub use models::variant::{AnnotatedVariant, Variant, VariantKind};
pub use significance::ClinicalSignificance;
