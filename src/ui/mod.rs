//! Operator-facing presentation
//!
//! - [`prompt`]: the [`Prompter`](prompt::Prompter) seam between the pipeline and the operator
//! - [`display`]: colored summaries and listings
//! - [`progress`]: per-bundle progress reporting

pub mod display;
pub mod progress;
pub mod prompt;
