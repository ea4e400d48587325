// Taint facts
//
// Architecture:
// - domain/ : Abstraction (access path + sub-states + provenance DAG),
//             source contexts, sink observations

pub mod domain;

pub use domain::{
    AbsRef, Abstraction, AbstractionAtSink, ActivationState, DefinitionKind, ExceptionState,
    ImplicitState, SourceContext, SourceSinkDefinition, UnitContainer,
};
