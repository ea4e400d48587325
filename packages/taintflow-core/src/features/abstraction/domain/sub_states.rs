//! Orthogonal state components of a taint fact

use crate::shared::ir::{MethodId, StmtId};
use std::fmt;

/// Deferred activation for flow-sensitive aliasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivationState {
    #[default]
    Active,
    /// Becomes active once the forward analysis passes `activation_unit`
    Inactive { activation_unit: StmtId },
}

impl ActivationState {
    pub fn is_active(self) -> bool {
        matches!(self, ActivationState::Active)
    }

    pub fn activation_unit(self) -> Option<StmtId> {
        match self {
            ActivationState::Active => None,
            ActivationState::Inactive { activation_unit } => Some(activation_unit),
        }
    }
}

/// Whether the value is currently travelling as a thrown exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExceptionState {
    #[default]
    Normal,
    Thrown,
}

impl ExceptionState {
    pub fn is_thrown(self) -> bool {
        matches!(self, ExceptionState::Thrown)
    }
}

/// A postdominator entry.
///
/// `unit == None` marks the exit of `method`: the conditional is only left
/// when the method returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitContainer {
    pub unit: Option<StmtId>,
    pub method: Option<MethodId>,
}

impl UnitContainer {
    pub fn unit(unit: StmtId) -> Self {
        Self {
            unit: Some(unit),
            method: None,
        }
    }

    pub fn method_exit(method: MethodId) -> Self {
        Self {
            unit: None,
            method: Some(method),
        }
    }
}

impl fmt::Display for UnitContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.unit, self.method) {
            (Some(unit), _) => write!(f, "{}", unit),
            (None, Some(method)) => write!(f, "exit(m{})", method.0),
            (None, None) => write!(f, "<none>"),
        }
    }
}

/// Control-dependency bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ImplicitState {
    /// Taint introduced by a control dependency rather than a data flow
    pub is_implicit: bool,
    /// Conditionals not yet left, innermost first
    pub postdominators: Vec<UnitContainer>,
}

impl ImplicitState {
    pub fn top(&self) -> Option<&UnitContainer> {
        self.postdominators.first()
    }

    pub fn is_inside_conditional(&self) -> bool {
        !self.postdominators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_state() {
        assert!(ActivationState::Active.is_active());
        let inactive = ActivationState::Inactive {
            activation_unit: StmtId(4),
        };
        assert!(!inactive.is_active());
        assert_eq!(inactive.activation_unit(), Some(StmtId(4)));
    }

    #[test]
    fn test_implicit_top_is_innermost() {
        let state = ImplicitState {
            is_implicit: false,
            postdominators: vec![UnitContainer::unit(StmtId(9)), UnitContainer::unit(StmtId(3))],
        };
        assert_eq!(state.top(), Some(&UnitContainer::unit(StmtId(9))));
        assert!(state.is_inside_conditional());
        assert!(!ImplicitState::default().is_inside_conditional());
    }
}
