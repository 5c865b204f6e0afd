pub mod converter;

pub use converter::{overround, remove_margin, to_implied};
