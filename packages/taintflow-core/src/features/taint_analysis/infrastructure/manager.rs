/*
 * Infoflow Manager
 *
 * Shared state of one analysis run, handed by reference to every flow
 * function, propagation rule and aliasing strategy:
 * - configuration, control-flow graph and pluggable collaborators
 * - access path factory, type utilities and the zero fact
 * - the aliasing controller and global static-field taints
 * - sink results and the activation call-site registry
 * - late-bound handles on the forward and alias solvers
 *
 * Solvers own their problems and the problems own an `Arc` of the manager,
 * so the manager only keeps weak handles on the solvers.
 */

use crate::config::InfoflowConfig;
use crate::features::abstraction::{AbsRef, AbstractionAtSink};
use crate::features::access_path::AccessPathFactory;
use crate::features::aliasing::Aliasing;
use crate::features::ifds_solver::{FactSet, IfdsSolver, TerminatableSolver, TerminationReason};
use crate::features::taint_analysis::infrastructure::global_taints::GlobalTaintManager;
use crate::features::taint_analysis::infrastructure::points_to::TypeBasedPointsTo;
use crate::features::taint_analysis::infrastructure::propagation_results::TaintPropagationResults;
use crate::features::taint_analysis::infrastructure::type_utils::TypeUtils;
use crate::features::taint_analysis::ports::{
    FlowFunctionType, InterproceduralCfg, NativeCallHandler, PointsToOracle,
    ResultsAvailableHandler, SourceInfo, SourceSinkOracle, TaintPropagationHandler, TaintWrapper,
};
use crate::shared::ir::{Method, MethodId, Program, Stmt, StmtId};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Package prefixes whose classes belong to the runtime
const SYSTEM_PACKAGES: &[&str] = &[
    "java.",
    "javax.",
    "jdk.",
    "sun.",
    "com.sun.",
    "android.",
    "androidx.",
    "com.android.",
    "com.google.",
    "org.omg.",
    "org.w3c.dom.",
    "org.xml.",
];

pub fn is_system_class(class: &str) -> bool {
    SYSTEM_PACKAGES.iter().any(|p| class.starts_with(p))
}

/// Call sites through which aliases of one activation unit were passed
#[derive(Debug, Default)]
struct ActivationCallSites {
    call_sites: FxHashSet<StmtId>,
    methods: FxHashSet<MethodId>,
}

pub struct InfoflowManager {
    config: Arc<InfoflowConfig>,
    icfg: Arc<dyn InterproceduralCfg>,
    source_sink: Arc<dyn SourceSinkOracle>,
    taint_wrapper: Option<Arc<dyn TaintWrapper>>,
    native_handler: Option<Arc<dyn NativeCallHandler>>,
    points_to: Arc<dyn PointsToOracle>,
    ap_factory: Arc<AccessPathFactory>,
    type_utils: TypeUtils,
    zero: AbsRef,
    aliasing: Aliasing,
    global_taints: GlobalTaintManager,
    results: TaintPropagationResults,
    propagation_handlers: Vec<Arc<dyn TaintPropagationHandler>>,

    /// Statements found to be sinks before propagation started
    sink_stmts: FxHashSet<StmtId>,
    source_stmts: FxHashSet<StmtId>,

    activation_call_sites: DashMap<StmtId, ActivationCallSites>,
    forward_solver: OnceCell<Weak<IfdsSolver>>,
    alias_solver: OnceCell<Weak<IfdsSolver>>,
    aborted: AtomicBool,
}

impl InfoflowManager {
    pub fn builder(
        config: Arc<InfoflowConfig>,
        icfg: Arc<dyn InterproceduralCfg>,
        source_sink: Arc<dyn SourceSinkOracle>,
    ) -> InfoflowManagerBuilder {
        InfoflowManagerBuilder {
            config,
            icfg,
            source_sink,
            taint_wrapper: None,
            native_handler: None,
            points_to: None,
            ap_factory: None,
            propagation_handlers: Vec::new(),
            result_handlers: Vec::new(),
            sink_stmts: FxHashSet::default(),
            source_stmts: FxHashSet::default(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &InfoflowConfig {
        &self.config
    }

    pub fn icfg(&self) -> &dyn InterproceduralCfg {
        self.icfg.as_ref()
    }

    pub fn shared_icfg(&self) -> Arc<dyn InterproceduralCfg> {
        Arc::clone(&self.icfg)
    }

    pub fn program(&self) -> &Program {
        self.icfg.program()
    }

    pub fn source_sink_oracle(&self) -> &dyn SourceSinkOracle {
        self.source_sink.as_ref()
    }

    pub fn taint_wrapper(&self) -> Option<&dyn TaintWrapper> {
        self.taint_wrapper.as_deref()
    }

    pub fn native_handler(&self) -> Option<&dyn NativeCallHandler> {
        self.native_handler.as_deref()
    }

    pub fn points_to(&self) -> &dyn PointsToOracle {
        self.points_to.as_ref()
    }

    pub fn ap_factory(&self) -> &AccessPathFactory {
        &self.ap_factory
    }

    pub fn type_utils(&self) -> &TypeUtils {
        &self.type_utils
    }

    pub fn aliasing(&self) -> &Aliasing {
        &self.aliasing
    }

    pub fn global_taints(&self) -> &GlobalTaintManager {
        &self.global_taints
    }

    pub fn results(&self) -> &TaintPropagationResults {
        &self.results
    }

    pub fn zero_value(&self) -> &AbsRef {
        &self.zero
    }

    pub fn is_zero(&self, fact: &AbsRef) -> bool {
        Arc::ptr_eq(fact, &self.zero) || **fact == *self.zero
    }

    /// Fact that only records being inside a tainted conditional
    pub fn is_conditional(&self, fact: &AbsRef) -> bool {
        fact.access_path().is_empty() && !self.is_zero(fact)
    }

    pub fn method(&self, id: MethodId) -> &Method {
        self.program().method(id)
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        self.program().stmt(id)
    }

    // ========================================================================
    // Sources and sinks
    // ========================================================================

    pub fn is_sink_stmt(&self, stmt: StmtId) -> bool {
        self.sink_stmts.contains(&stmt)
    }

    pub fn is_source_stmt(&self, stmt: StmtId) -> bool {
        self.source_stmts.contains(&stmt)
    }

    pub fn sink_stmt_count(&self) -> usize {
        self.sink_stmts.len()
    }

    pub fn source_info(&self, stmt: StmtId) -> Option<SourceInfo> {
        if !self.is_source_stmt(stmt) {
            return None;
        }
        self.source_sink.source_info(self.stmt(stmt), self)
    }

    /// Records a fact observed at a sink; `false` asks the analysis to stop
    pub fn add_result(&self, at_sink: AbstractionAtSink) -> bool {
        let keep_going = self.results.add_result(self, at_sink);
        if !keep_going {
            self.request_abort();
        }
        keep_going
    }

    // ========================================================================
    // Scope
    // ========================================================================

    /// Methods the analysis does not descend into
    pub fn is_excluded(&self, method: MethodId) -> bool {
        let m = self.method(method);
        if self.config.exclude_library_classes && self.program().hierarchy().is_library_class(m.class())
        {
            return true;
        }
        if self.config.ignore_flows_in_system_packages && is_system_class(m.class()) {
            return true;
        }
        !m.is_native && !m.has_body()
    }

    // ========================================================================
    // Activation registry
    // ========================================================================

    /// `call_site` hands aliases activated at `activation_unit` back to the caller
    pub fn is_call_site_activating(&self, call_site: StmtId, activation_unit: Option<StmtId>) -> bool {
        if !self.config.effective_flow_sensitive_aliasing() {
            return false;
        }
        let Some(unit) = activation_unit else {
            return false;
        };
        self.activation_call_sites
            .get(&unit)
            .map_or(false, |sites| sites.call_sites.contains(&call_site))
    }

    /// Remembers that `abs` left `callee` through `call_site`
    pub fn register_activation_call_site(
        &self,
        call_site: StmtId,
        callee: MethodId,
        abs: &AbsRef,
    ) -> bool {
        if !self.config.effective_flow_sensitive_aliasing() {
            return false;
        }
        let Some(unit) = abs.activation_unit() else {
            return false;
        };
        let caller = self.icfg.method_of(call_site);
        let mut sites = self.activation_call_sites.entry(unit).or_default();
        if sites.call_sites.contains(&call_site) {
            return false;
        }
        if !abs.is_abstraction_active()
            && self.icfg.method_of(unit) != callee
            && !sites.methods.contains(&callee)
        {
            return false;
        }
        sites.call_sites.insert(call_site);
        sites.methods.insert(caller);
        true
    }

    // ========================================================================
    // Solvers
    // ========================================================================

    pub fn set_forward_solver(&self, solver: &Arc<IfdsSolver>) {
        let _ = self.forward_solver.set(Arc::downgrade(solver));
    }

    pub fn set_alias_solver(&self, solver: &Arc<IfdsSolver>) {
        let _ = self.alias_solver.set(Arc::downgrade(solver));
    }

    pub fn forward_solver(&self) -> Option<Arc<IfdsSolver>> {
        self.forward_solver.get().and_then(Weak::upgrade)
    }

    pub fn alias_solver(&self) -> Option<Arc<IfdsSolver>> {
        self.alias_solver.get().and_then(Weak::upgrade)
    }

    /// Stops both solvers after a result handler or the result limit asked for it
    pub fn request_abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Analysis abort requested");
        for solver in [self.forward_solver(), self.alias_solver()].into_iter().flatten() {
            solver.force_terminate(TerminationReason::AbortRequested);
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn notify_flow_in(&self, stmt: StmtId, taint: &AbsRef, kind: FlowFunctionType) {
        for handler in &self.propagation_handlers {
            handler.notify_flow_in(stmt, taint, self, kind);
        }
    }

    pub fn notify_flow_out(
        &self,
        stmt: StmtId,
        d1: Option<&AbsRef>,
        incoming: &AbsRef,
        outgoing: FactSet,
        kind: FlowFunctionType,
    ) -> FactSet {
        self.propagation_handlers
            .iter()
            .fold(outgoing, |out, handler| {
                handler.notify_flow_out(stmt, d1, incoming, out, self, kind)
            })
    }
}

pub struct InfoflowManagerBuilder {
    config: Arc<InfoflowConfig>,
    icfg: Arc<dyn InterproceduralCfg>,
    source_sink: Arc<dyn SourceSinkOracle>,
    taint_wrapper: Option<Arc<dyn TaintWrapper>>,
    native_handler: Option<Arc<dyn NativeCallHandler>>,
    points_to: Option<Arc<dyn PointsToOracle>>,
    ap_factory: Option<Arc<AccessPathFactory>>,
    propagation_handlers: Vec<Arc<dyn TaintPropagationHandler>>,
    result_handlers: Vec<Arc<dyn ResultsAvailableHandler>>,
    sink_stmts: FxHashSet<StmtId>,
    source_stmts: FxHashSet<StmtId>,
}

impl InfoflowManagerBuilder {
    pub fn taint_wrapper(mut self, wrapper: Option<Arc<dyn TaintWrapper>>) -> Self {
        self.taint_wrapper = wrapper;
        self
    }

    pub fn native_handler(mut self, handler: Option<Arc<dyn NativeCallHandler>>) -> Self {
        self.native_handler = handler;
        self
    }

    pub fn points_to(mut self, points_to: Option<Arc<dyn PointsToOracle>>) -> Self {
        self.points_to = points_to;
        self
    }

    /// Shares one factory, and thereby one interning table, across runs
    pub fn ap_factory(mut self, factory: Arc<AccessPathFactory>) -> Self {
        self.ap_factory = Some(factory);
        self
    }

    pub fn propagation_handlers(mut self, handlers: Vec<Arc<dyn TaintPropagationHandler>>) -> Self {
        self.propagation_handlers = handlers;
        self
    }

    pub fn result_handlers(mut self, handlers: Vec<Arc<dyn ResultsAvailableHandler>>) -> Self {
        self.result_handlers = handlers;
        self
    }

    pub fn sink_stmts(mut self, stmts: FxHashSet<StmtId>) -> Self {
        self.sink_stmts = stmts;
        self
    }

    pub fn source_stmts(mut self, stmts: FxHashSet<StmtId>) -> Self {
        self.source_stmts = stmts;
        self
    }

    pub fn build(self) -> Arc<InfoflowManager> {
        let hierarchy = self.icfg.program().shared_hierarchy();
        let ap_factory = self
            .ap_factory
            .unwrap_or_else(|| Arc::new(AccessPathFactory::new(&self.config, Arc::clone(&hierarchy))));
        let points_to = self
            .points_to
            .unwrap_or_else(|| Arc::new(TypeBasedPointsTo::new(Arc::clone(&hierarchy))));
        let zero: AbsRef = Arc::new(crate::features::abstraction::Abstraction::zero(ap_factory.empty()));
        let type_utils = TypeUtils::new(hierarchy, self.config.enable_type_checking);
        let aliasing = Aliasing::for_config(&self.config);

        Arc::new(InfoflowManager {
            config: self.config,
            icfg: self.icfg,
            source_sink: self.source_sink,
            taint_wrapper: self.taint_wrapper,
            native_handler: self.native_handler,
            points_to,
            ap_factory,
            type_utils,
            zero,
            aliasing,
            global_taints: GlobalTaintManager::new(),
            results: TaintPropagationResults::new(self.result_handlers),
            propagation_handlers: self.propagation_handlers,
            sink_stmts: self.sink_stmts,
            source_stmts: self.source_stmts,
            activation_call_sites: DashMap::new(),
            forward_solver: OnceCell::new(),
            alias_solver: OnceCell::new(),
            aborted: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::taint_analysis::infrastructure::icfg::ProgramIcfg;
    use crate::features::taint_analysis::infrastructure::source_sink_manager::MethodSourceSinkManager;
    use crate::shared::ir::{MethodRef, ProgramBuilder, Type};

    fn manager(config: InfoflowConfig) -> (Arc<InfoflowManager>, MethodId, MethodId, MethodId) {
        let mut pb = ProgramBuilder::new();
        pb.class("app.Main", None);
        pb.library_class("lib.Util", None);
        let lib_sig = MethodRef::new("lib.Util", "help", vec![], Type::Void);
        let mut mb = pb.method(&lib_sig, true);
        mb.ret_void();
        let lib = mb.finish();
        let phantom = pb.declare_method(&MethodRef::new("app.Main", "gone", vec![], Type::Void), true);
        let main_sig = MethodRef::new("app.Main", "main", vec![], Type::Void);
        let mut mb = pb.method(&main_sig, true);
        mb.ret_void();
        let main = mb.finish();
        pb.entry_point(main);
        let icfg: Arc<dyn InterproceduralCfg> = Arc::new(ProgramIcfg::new(Arc::new(pb.build())));
        let mgr = InfoflowManager::builder(
            Arc::new(config),
            icfg,
            Arc::new(MethodSourceSinkManager::new()),
        )
        .build();
        (mgr, main, lib, phantom)
    }

    #[test]
    fn test_exclusion_of_library_and_phantom_methods() {
        let (mgr, main, lib, phantom) = manager(InfoflowConfig::default());
        assert!(!mgr.is_excluded(main));
        assert!(mgr.is_excluded(lib));
        assert!(mgr.is_excluded(phantom));

        let config = InfoflowConfig::default().with_exclude_library_classes(false);
        let (mgr, _, lib, _) = manager(config);
        assert!(!mgr.is_excluded(lib));
    }

    #[test]
    fn test_zero_is_not_conditional() {
        let (mgr, _, _, _) = manager(InfoflowConfig::default());
        let zero = Arc::clone(mgr.zero_value());
        assert!(mgr.is_zero(&zero));
        assert!(!mgr.is_conditional(&zero));
    }

    #[test]
    fn test_system_packages() {
        assert!(is_system_class("java.lang.String"));
        assert!(is_system_class("android.app.Activity"));
        assert!(!is_system_class("javafoo.Bar"));
        assert!(!is_system_class("app.Main"));
    }

    #[test]
    fn test_abort_without_solvers_is_recorded() {
        let (mgr, _, _, _) = manager(InfoflowConfig::default());
        assert!(!mgr.is_aborted());
        mgr.request_abort();
        assert!(mgr.is_aborted());
        assert!(mgr.forward_solver().is_none());
    }
}
