//! Manifest templating for the MicroVM provider
//!
//! Manifests are rendered with minijinja using the standard `{{ ... }}`
//! delimiters. Rendering is strict in one direction only: a template that
//! prints or iterates a key missing from the value map fails with
//! [`TemplateError`], while keys present in the map but never referenced are
//! ignored. Truthiness checks (`{% if key %}`) on absent keys are allowed so
//! optional sections can be gated on the presence of a key.

mod engine;
mod error;

pub use engine::{execute, Templater, TemplateValues};
pub use error::TemplateError;
