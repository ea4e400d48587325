pub mod abstraction;
pub mod at_sink;
pub mod source_context;
pub mod sub_states;

pub use abstraction::{AbsRef, Abstraction};
pub use at_sink::AbstractionAtSink;
pub use source_context::{DefinitionKind, SourceContext, SourceSinkDefinition};
pub use sub_states::{ActivationState, ExceptionState, ImplicitState, UnitContainer};
