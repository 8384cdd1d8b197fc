//! Layer-wise relevance propagation on top of `relprop-core`.
//!
//! [`PropagationRule`]s hook into a layer's forward and backward passes to
//! redistribute relevance; [`Lrp`] attaches them to a [`Sequential`] model and
//! runs one attribution.
//!
//! [`Sequential`]: relprop_core::model::Sequential

pub mod lrp;
pub mod rules;
pub mod stabilize;
pub mod store;
pub mod substitute;

pub use lrp::{AttributeOptions, LayerRelevance, LayerRelevanceMode, Lrp, LrpAttribution};
pub use rules::{PropagationRule, RuleKind};
pub use stabilize::{stabilize, stabilize_scalar, stabilized_div};
pub use store::{Relevance, RelevanceStore};
pub use substitute::SubstituteSlots;
