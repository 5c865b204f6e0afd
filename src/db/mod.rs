pub mod opportunities;

pub use opportunities::{OpportunityStore, StoredOpportunity};
