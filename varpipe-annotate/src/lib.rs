//! Multi-source variant annotation.
//!
//! For each called variant the [`Annotator`] composes three upstream
//! lookups with short-circuit fallback: a regional functional lookup
//! (consequence, gene, transcript, predictions, frequency), an identifier
//! lookup when the first stage produced none, and a two-step
//! clinical-significance lookup once an identifier is known. Any stage
//! failing only costs that stage's fields; [`Annotate::annotate_all`]
//! itself never fails and always returns one record per input variant, in
//! input order.

pub mod annotator;
pub mod records;

pub use annotator::{Annotate, AnnotateConfig, Annotator};
