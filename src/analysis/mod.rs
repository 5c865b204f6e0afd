pub mod comparator;
pub mod engine;

pub use comparator::{fair_probability, side_set_overround, Comparator, ComparisonOutcome};
pub use engine::ComparisonEngine;
