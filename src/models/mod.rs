pub mod decision;
pub mod loaders;
pub mod paper;
pub mod scope;
pub mod usage;

pub use decision::{ClassifierRequest, ClassifierResponse, DecisionResult, DecisionSchema};
pub use loaders::{load_scope_catalog, parse_scope_catalog};
pub use paper::{full_text, PaperMetadata, Section};
pub use scope::{ScopeCatalog, ScopeConfig, NO_INSTRUCTIONS};
pub use usage::TokenUsage;
