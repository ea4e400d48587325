//! Program fixtures
//!
//! Every fixture declares the same bodyless `app.Api.source()` and
//! `app.Api.sink(String)` methods, so one oracle fits all programs.

use std::sync::Arc;
use taintflow_core::config::InfoflowConfig;
use taintflow_core::features::taint_analysis::{
    Infoflow, InfoflowResults, InterproceduralCfg, MethodSourceSinkManager, ProgramIcfg,
    TaintPropagationHandler,
};
use taintflow_core::shared::ir::{MethodRef, Program, ProgramBuilder, Type};

pub const API_CLASS: &str = "app.Api";
pub const MAIN_CLASS: &str = "app.Main";

pub fn source_method() -> MethodRef {
    MethodRef::new(API_CLASS, "source", vec![], Type::string())
}

pub fn sink_method() -> MethodRef {
    MethodRef::new(API_CLASS, "sink", vec![Type::object()], Type::Void)
}

pub fn main_method() -> MethodRef {
    MethodRef::new(MAIN_CLASS, "main", vec![], Type::Void)
}

/// Builder with the API class and its source and sink declared
pub fn program_builder() -> ProgramBuilder {
    let mut pb = ProgramBuilder::new();
    pb.class(API_CLASS, None);
    pb.class(MAIN_CLASS, None);
    pb.declare_method(&source_method(), true);
    pb.declare_method(&sink_method(), true);
    pb
}

pub fn oracle() -> MethodSourceSinkManager {
    MethodSourceSinkManager::new()
        .with_source(&source_method())
        .with_sink(&sink_method())
}

/// Small worker pool, no watchers beyond the defaults
pub fn test_config() -> InfoflowConfig {
    InfoflowConfig::default().with_threads(2)
}

pub fn icfg(program: Program) -> Arc<dyn InterproceduralCfg> {
    Arc::new(ProgramIcfg::new(Arc::new(program)))
}

pub fn analyze(program: Program, config: InfoflowConfig) -> InfoflowResults {
    Infoflow::new(config, icfg(program), Arc::new(oracle()))
        .expect("valid configuration")
        .run()
}

pub fn analyze_observed(
    program: Program,
    config: InfoflowConfig,
    observer: Arc<dyn TaintPropagationHandler>,
) -> InfoflowResults {
    Infoflow::new(config, icfg(program), Arc::new(oracle()))
        .expect("valid configuration")
        .with_propagation_handler(observer)
        .run()
}
