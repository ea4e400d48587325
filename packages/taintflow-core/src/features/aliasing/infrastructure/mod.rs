//! Aliasing controller and strategy implementations

pub mod aliasing;
pub mod base_selector;
pub mod flow_sensitive;
pub mod implicit_flow;
pub mod lazy;
pub mod null;
pub mod pts_based;

pub use aliasing::Aliasing;
pub use base_selector::{base_matches, base_matches_strict, select_base, select_base_list};
pub use flow_sensitive::FlowSensitiveAliasStrategy;
pub use implicit_flow::ImplicitFlowAliasStrategy;
pub use lazy::LazyAliasStrategy;
pub use null::NullAliasStrategy;
pub use pts_based::PtsBasedAliasStrategy;
