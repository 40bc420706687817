//! Built-in selection strategies.
//!
//! Three variants, matching the three study arms:
//!
//! - [`MaxCorrStrategy`]: correlation-maximizing MIP selection, cap weights
//! - [`AttributeStrategy`]: MIP selection plus attribute-matching LP weights
//! - [`RandomStrategy`]: seeded random selection baseline

mod attribute_match;
mod max_corr;
mod random_pick;

pub use attribute_match::{default_targets, AttributeStrategy};
pub use max_corr::MaxCorrStrategy;
pub use random_pick::RandomStrategy;
