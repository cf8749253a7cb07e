pub mod policy;
mod service;
mod types;

pub use policy::SampleTally;
pub use service::DecisionService;
pub use types::{Item, ItemKind, Reason, Verdict};
