// Alias tracking
//
// Hexagonal Architecture:
// - ports/          : AliasingStrategy (how aliases of a new heap taint are
//                     found and fed back into the forward analysis)
// - infrastructure/ : Aliasing controller and its base-matching helpers,
//                     flow-sensitive (backward solver), points-to based,
//                     lazy, null and implicit-flow strategies

pub mod infrastructure;
pub mod ports;

pub use infrastructure::{
    base_matches, base_matches_strict, select_base, select_base_list, Aliasing,
    FlowSensitiveAliasStrategy, ImplicitFlowAliasStrategy, LazyAliasStrategy, NullAliasStrategy,
    PtsBasedAliasStrategy,
};
pub use ports::AliasingStrategy;
