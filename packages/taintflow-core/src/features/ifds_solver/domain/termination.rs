//! Why a run stopped

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Reason a solver was forced to stop before reaching its fixed point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The time budget of the phase elapsed
    Timeout,
    /// Estimated memory use crossed the configured threshold
    OutOfMemory,
    /// Cancelled by the caller
    Cancelled,
    /// A result handler or the result limit asked for an early stop
    AbortRequested,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::Timeout => "timeout",
            TerminationReason::OutOfMemory => "out of memory",
            TerminationReason::Cancelled => "cancelled",
            TerminationReason::AbortRequested => "abort requested",
        };
        f.write_str(s)
    }
}

/// Termination flags of a whole analysis run
///
/// Empty means every phase ran to completion. An early stop requested by a
/// result handler is not a failure and sets no flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TerminationState(u8);

impl TerminationState {
    pub const SUCCESS: Self = Self(0);
    pub const DATA_FLOW_TIMEOUT: Self = Self(1);
    pub const DATA_FLOW_CANCELLED: Self = Self(1 << 1);
    pub const DATA_FLOW_OOM: Self = Self(1 << 2);
    pub const PATH_RECON_TIMEOUT: Self = Self(1 << 3);
    pub const PATH_RECON_CANCELLED: Self = Self(1 << 4);
    pub const PATH_RECON_OOM: Self = Self(1 << 5);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Flag for a data-flow solver stopped for `reason`
    pub fn from_data_flow(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::Timeout => Self::DATA_FLOW_TIMEOUT,
            TerminationReason::OutOfMemory => Self::DATA_FLOW_OOM,
            TerminationReason::Cancelled => Self::DATA_FLOW_CANCELLED,
            TerminationReason::AbortRequested => Self::SUCCESS,
        }
    }

    /// Flag for a source search stopped for `reason`
    pub fn from_path_reconstruction(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::Timeout => Self::PATH_RECON_TIMEOUT,
            TerminationReason::OutOfMemory => Self::PATH_RECON_OOM,
            TerminationReason::Cancelled => Self::PATH_RECON_CANCELLED,
            TerminationReason::AbortRequested => Self::SUCCESS,
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for TerminationState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TerminationState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TerminationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return f.write_str("success");
        }
        let names = [
            (Self::DATA_FLOW_TIMEOUT, "data flow timeout"),
            (Self::DATA_FLOW_CANCELLED, "data flow cancelled"),
            (Self::DATA_FLOW_OOM, "data flow out of memory"),
            (Self::PATH_RECON_TIMEOUT, "path reconstruction timeout"),
            (Self::PATH_RECON_CANCELLED, "path reconstruction cancelled"),
            (Self::PATH_RECON_OOM, "path reconstruction out of memory"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&set.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let mut state = TerminationState::SUCCESS;
        assert!(state.is_success());
        state |= TerminationState::from_data_flow(TerminationReason::Timeout);
        state |= TerminationState::PATH_RECON_TIMEOUT;
        assert!(state.contains(TerminationState::DATA_FLOW_TIMEOUT));
        assert!(state.contains(TerminationState::PATH_RECON_TIMEOUT));
        assert!(!state.contains(TerminationState::DATA_FLOW_OOM));
        assert_eq!(state.to_string(), "data flow timeout, path reconstruction timeout");
    }

    #[test]
    fn test_abort_request_is_not_a_failure() {
        let state = TerminationState::from_data_flow(TerminationReason::AbortRequested);
        assert!(state.is_success());
    }

    #[test]
    fn test_path_reconstruction_flags_are_separate() {
        let oom = TerminationState::from_path_reconstruction(TerminationReason::OutOfMemory);
        let cancelled = TerminationState::from_path_reconstruction(TerminationReason::Cancelled);
        assert_eq!(oom, TerminationState::PATH_RECON_OOM);
        assert_eq!(cancelled, TerminationState::PATH_RECON_CANCELLED);
        assert!(!oom.contains(TerminationState::DATA_FLOW_OOM));
        assert!(TerminationState::from_path_reconstruction(TerminationReason::AbortRequested).is_success());
    }
}
