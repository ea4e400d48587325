//! Infoflow configuration
//!
//! All options carry serde defaults, so partial YAML documents are accepted.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How heap aliases of tainted values are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasingAlgorithm {
    /// On-demand backward alias solver
    FlowSensitive,
    /// Points-to set intersection
    PtsBased,
    /// No alias tracking
    None,
    /// Propagate everywhere and check aliasing at read sites
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticFieldTrackingMode {
    /// Static fields are tracked like any other access path
    ContextFlowSensitive,
    /// Static field taints live in a global state valid everywhere
    ContextFlowInsensitive,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitFlowMode {
    NoImplicitFlows,
    /// Only tainted array indices taint the accessed element
    ArrayAccesses,
    AllImplicitFlows,
}

impl ImplicitFlowMode {
    pub fn track_array_accesses(self) -> bool {
        self != ImplicitFlowMode::NoImplicitFlows
    }

    pub fn track_control_flow_dependencies(self) -> bool {
        self == ImplicitFlowMode::AllImplicitFlows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Short access paths, no exceptions or implicit flows
    Fast,
    Balanced,
    /// Longer access paths, implicit flows, unlimited join points
    Precise,
}

impl Preset {
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "precise" => Ok(Self::Precise),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessPathConfig {
    /// Maximum number of fields in an access path (0..=100)
    pub access_path_length: usize,

    /// Fold recursive field chains into registered base patterns
    pub use_recursive_access_paths: bool,

    /// Fold `this$0` outer-class chains
    pub use_this_chain_reduction: bool,

    /// Collapse immediately repeating field groups
    pub use_same_field_reduction: bool,
}

impl Default for AccessPathConfig {
    fn default() -> Self {
        Self {
            access_path_length: 5,
            use_recursive_access_paths: true,
            use_this_chain_reduction: true,
            use_same_field_reduction: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Neighbors kept per join point (`None` = unlimited)
    pub max_join_point_abstractions: Option<usize>,

    /// Call sites with more callees are only handled via call-to-return
    pub max_callees_per_call_site: Option<usize>,

    /// Facts derived through longer predecessor chains are dropped
    pub max_abstraction_path_length: Option<usize>,

    /// Worker threads (`None` = number of CPUs)
    pub threads: Option<usize>,

    /// Deduplicate neighbors with equal predecessor, statement and call site
    pub merge_neighbors: bool,

    /// Taints leaving a method without a calling context flow into all callers
    pub follow_returns_past_seeds: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_join_point_abstractions: Some(10),
            max_callees_per_call_site: Some(75),
            max_abstraction_path_length: Some(100),
            threads: None,
            merge_neighbors: false,
            follow_returns_past_seeds: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Budget for pairing results with their sources (`None` = unlimited)
    pub path_reconstruction_timeout_secs: Option<u64>,

    /// Abort the source search of a single result after this many visited facts
    pub max_visited_per_result: Option<usize>,

    /// Memory budget while pairing sources (`None` = `memory_budget_bytes`)
    pub memory_budget_bytes: Option<u64>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            path_reconstruction_timeout_secs: Some(180),
            max_visited_per_result: None,
            memory_budget_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoflowConfig {
    pub access_path: AccessPathConfig,
    pub solver: SolverConfig,
    pub path: PathConfig,

    pub aliasing_algorithm: AliasingAlgorithm,

    /// Aliases discovered backwards stay inactive until their activation unit
    pub flow_sensitive_aliasing: bool,

    pub static_field_tracking_mode: StaticFieldTrackingMode,
    pub implicit_flow_mode: ImplicitFlowMode,

    /// Track taints carried by thrown exceptions
    pub enable_exceptions: bool,
    pub enable_array_tracking: bool,
    /// A new array whose size is tainted has a tainted length
    pub enable_array_size_tainting: bool,
    /// Drop taints on infeasible casts
    pub enable_type_checking: bool,
    pub enable_instance_of_tainting: bool,

    /// Do not descend into methods of library classes
    pub exclude_library_classes: bool,
    /// Do not descend into `java.*`, `javax.*`, ... methods
    pub ignore_flows_in_system_packages: bool,

    /// Allow taints to flow into source methods
    pub inspect_sources: bool,
    /// Allow taints to flow into sink methods
    pub inspect_sinks: bool,

    /// Stop once this many results have been found (0 = unlimited)
    pub stop_after_first_k_flows: usize,

    /// Solve each source statement separately and merge the results
    pub one_source_at_a_time: bool,

    /// Data-flow budget in seconds (`None` = unlimited, `Some(0)` = already expired)
    pub data_flow_timeout_secs: Option<u64>,

    /// Fraction of `memory_budget_bytes` at which the solvers are stopped (0.0, 1.0]
    pub memory_threshold: f64,
    pub memory_budget_bytes: u64,

    /// Poll interval of the timeout and memory watchers
    pub watcher_interval_ms: u64,
}

impl Default for InfoflowConfig {
    fn default() -> Self {
        Self {
            access_path: AccessPathConfig::default(),
            solver: SolverConfig::default(),
            path: PathConfig::default(),
            aliasing_algorithm: AliasingAlgorithm::FlowSensitive,
            flow_sensitive_aliasing: true,
            static_field_tracking_mode: StaticFieldTrackingMode::ContextFlowSensitive,
            implicit_flow_mode: ImplicitFlowMode::NoImplicitFlows,
            enable_exceptions: true,
            enable_array_tracking: true,
            enable_array_size_tainting: true,
            enable_type_checking: true,
            enable_instance_of_tainting: false,
            exclude_library_classes: true,
            ignore_flows_in_system_packages: true,
            inspect_sources: false,
            inspect_sinks: true,
            stop_after_first_k_flows: 0,
            one_source_at_a_time: false,
            data_flow_timeout_secs: None,
            memory_threshold: 0.9,
            memory_budget_bytes: 4 * 1024 * 1024 * 1024,
            watcher_interval_ms: 50,
        }
    }
}

impl InfoflowConfig {
    pub fn from_preset(preset: Preset) -> Self {
        let base = Self::default();
        match preset {
            Preset::Fast => Self {
                access_path: AccessPathConfig {
                    access_path_length: 3,
                    ..base.access_path.clone()
                },
                solver: SolverConfig {
                    max_join_point_abstractions: Some(5),
                    max_callees_per_call_site: Some(20),
                    ..base.solver.clone()
                },
                static_field_tracking_mode: StaticFieldTrackingMode::ContextFlowInsensitive,
                enable_exceptions: false,
                ..base
            },
            Preset::Balanced => base,
            Preset::Precise => Self {
                access_path: AccessPathConfig {
                    access_path_length: 7,
                    ..base.access_path.clone()
                },
                solver: SolverConfig {
                    max_join_point_abstractions: None,
                    max_callees_per_call_site: None,
                    ..base.solver.clone()
                },
                implicit_flow_mode: ImplicitFlowMode::AllImplicitFlows,
                ..base
            },
        }
    }

    /// Parses and validates a YAML document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks ranges and option combinations
    pub fn validate(&self) -> ConfigResult<()> {
        if self.access_path.access_path_length > 100 {
            return Err(ConfigError::range_with_hint(
                "access_path.access_path_length",
                self.access_path.access_path_length,
                0,
                100,
                "Long access paths rarely add precision; 5 is a good default",
            ));
        }
        if self.static_field_tracking_mode != StaticFieldTrackingMode::None
            && self.access_path.access_path_length == 0
        {
            return Err(ConfigError::conflict(
                "static field tracking requires access paths of at least one field",
                "set static_field_tracking_mode to none or raise access_path_length",
            ));
        }
        if !(self.memory_threshold > 0.0 && self.memory_threshold <= 1.0) {
            return Err(ConfigError::range_with_hint(
                "memory_threshold",
                self.memory_threshold,
                "0 (exclusive)",
                1,
                "The threshold is a fraction of memory_budget_bytes",
            ));
        }
        if self.solver.threads == Some(0) {
            return Err(ConfigError::range_with_hint(
                "solver.threads",
                0,
                1,
                usize::MAX,
                "Omit the option to use one thread per CPU",
            ));
        }
        if self.solver.max_join_point_abstractions == Some(0) {
            return Err(ConfigError::range_with_hint(
                "solver.max_join_point_abstractions",
                0,
                1,
                usize::MAX,
                "Omit the option to keep every join-point abstraction",
            ));
        }
        if self.watcher_interval_ms == 0 {
            return Err(ConfigError::range_with_hint(
                "watcher_interval_ms",
                0,
                1,
                u64::MAX,
                "Watchers need a positive poll interval",
            ));
        }
        if self.implicit_flow_mode.track_control_flow_dependencies()
            && self.aliasing_algorithm == AliasingAlgorithm::Lazy
        {
            return Err(ConfigError::conflict(
                "implicit flows cannot be combined with lazy aliasing",
                "use the flow_sensitive or pts_based aliasing algorithm",
            ));
        }
        Ok(())
    }

    /// Deferred activation only exists for the flow-sensitive strategies
    pub fn effective_flow_sensitive_aliasing(&self) -> bool {
        self.flow_sensitive_aliasing
            && matches!(
                self.aliasing_algorithm,
                AliasingAlgorithm::FlowSensitive | AliasingAlgorithm::Lazy
            )
    }

    pub fn with_access_path_length(mut self, length: usize) -> Self {
        self.access_path.access_path_length = length;
        self
    }

    pub fn with_aliasing_algorithm(mut self, algorithm: AliasingAlgorithm) -> Self {
        self.aliasing_algorithm = algorithm;
        self
    }

    pub fn with_flow_sensitive_aliasing(mut self, enabled: bool) -> Self {
        self.flow_sensitive_aliasing = enabled;
        self
    }

    pub fn with_static_field_tracking(mut self, mode: StaticFieldTrackingMode) -> Self {
        self.static_field_tracking_mode = mode;
        self
    }

    pub fn with_implicit_flow_mode(mut self, mode: ImplicitFlowMode) -> Self {
        self.implicit_flow_mode = mode;
        self
    }

    pub fn with_exceptions(mut self, enabled: bool) -> Self {
        self.enable_exceptions = enabled;
        self
    }

    pub fn with_data_flow_timeout(mut self, secs: Option<u64>) -> Self {
        self.data_flow_timeout_secs = secs;
        self
    }

    pub fn with_memory_threshold(mut self, threshold: f64) -> Self {
        self.memory_threshold = threshold;
        self
    }

    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    pub fn with_path_memory_budget(mut self, bytes: Option<u64>) -> Self {
        self.path.memory_budget_bytes = bytes;
        self
    }

    pub fn with_path_reconstruction_timeout(mut self, secs: Option<u64>) -> Self {
        self.path.path_reconstruction_timeout_secs = secs;
        self
    }

    pub fn with_max_join_point_abstractions(mut self, max: Option<usize>) -> Self {
        self.solver.max_join_point_abstractions = max;
        self
    }

    pub fn with_max_callees_per_call_site(mut self, max: Option<usize>) -> Self {
        self.solver.max_callees_per_call_site = max;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.solver.threads = Some(threads);
        self
    }

    pub fn with_one_source_at_a_time(mut self, enabled: bool) -> Self {
        self.one_source_at_a_time = enabled;
        self
    }

    pub fn with_stop_after_first_k_flows(mut self, k: usize) -> Self {
        self.stop_after_first_k_flows = k;
        self
    }

    pub fn with_inspect_sources(mut self, enabled: bool) -> Self {
        self.inspect_sources = enabled;
        self
    }

    pub fn with_inspect_sinks(mut self, enabled: bool) -> Self {
        self.inspect_sinks = enabled;
        self
    }

    pub fn with_exclude_library_classes(mut self, enabled: bool) -> Self {
        self.exclude_library_classes = enabled;
        self
    }

    pub fn with_type_checking(mut self, enabled: bool) -> Self {
        self.enable_type_checking = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(InfoflowConfig::default().validate().is_ok());
        for preset in [Preset::Fast, Preset::Balanced, Preset::Precise] {
            assert!(InfoflowConfig::from_preset(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_static_tracking_with_zero_length_is_rejected() {
        let config = InfoflowConfig::default().with_access_path_length(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict { .. })
        ));

        let config = config.with_static_field_tracking(StaticFieldTrackingMode::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_threshold_range() {
        let config = InfoflowConfig::default().with_memory_threshold(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
        let config = InfoflowConfig::default().with_memory_threshold(1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_join_points_rejected() {
        let config = InfoflowConfig::default().with_max_join_point_abstractions(Some(0));
        assert!(matches!(config.validate(), Err(ConfigError::Range { .. })));
        let config = config.with_max_join_point_abstractions(None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
access_path:
  access_path_length: 3
aliasing_algorithm: pts_based
implicit_flow_mode: array_accesses
data_flow_timeout_secs: 30
"#;
        let config = InfoflowConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.access_path.access_path_length, 3);
        assert!(config.access_path.use_recursive_access_paths);
        assert_eq!(config.aliasing_algorithm, AliasingAlgorithm::PtsBased);
        assert_eq!(config.implicit_flow_mode, ImplicitFlowMode::ArrayAccesses);
        assert_eq!(config.data_flow_timeout_secs, Some(30));
        assert_eq!(config.solver, SolverConfig::default());
    }

    #[test]
    fn test_yaml_validation_is_applied() {
        let yaml = "access_path:\n  access_path_length: 0\n";
        assert!(InfoflowConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = InfoflowConfig::from_preset(Preset::Precise);
        let text = config.to_yaml_string().unwrap();
        let back = InfoflowConfig::from_yaml_str(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(Preset::parse("FAST").unwrap(), Preset::Fast);
        assert!(matches!(
            Preset::parse("thorough"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_effective_flow_sensitivity() {
        let config = InfoflowConfig::default().with_aliasing_algorithm(AliasingAlgorithm::PtsBased);
        assert!(!config.effective_flow_sensitive_aliasing());
        assert!(InfoflowConfig::default().effective_flow_sensitive_aliasing());
    }
}
