pub mod comparison_runner;

pub use comparison_runner::ComparisonWorker;
