// Taint analysis
//
// Hexagonal Architecture:
// - domain/         : InfoflowResults, PerformanceData
// - ports/          : InterproceduralCfg, SourceSinkOracle, TaintWrapper,
//                     NativeCallHandler, propagation and result observers,
//                     PointsToOracle
// - infrastructure/ : manager, ICFG, IFDS problems, propagation rules,
//                     source finder and default collaborators
// - application/    : Infoflow driver

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::Infoflow;
pub use domain::{DataFlowResult, InfoflowResults, PerformanceData, ResultSinkInfo, ResultSourceInfo};
pub use infrastructure::{
    DefaultNativeCallHandler, InfoflowManager, MethodSourceSinkManager, ProgramIcfg,
    SimpleTaintWrapper, SourceFinder, TypeBasedPointsTo,
};
pub use ports::{
    FlowFunctionType, InterproceduralCfg, NativeCallHandler, PointsToOracle,
    ResultsAvailableHandler, SinkInfo, SourceInfo, SourceSinkOracle, TaintPropagationHandler,
    TaintWrapper,
};
