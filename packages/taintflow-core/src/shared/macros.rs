//! Hot-path tracing macros
//!
//! Per-edge tracing is compiled out unless the `trace` feature is enabled.

#[cfg(not(feature = "trace"))]
#[macro_export]
macro_rules! trace_edge {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "trace")]
#[macro_export]
macro_rules! trace_edge {
    ($($arg:tt)*) => { ::tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "trace"))]
#[macro_export]
macro_rules! trace_flow {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "trace")]
#[macro_export]
macro_rules! trace_flow {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}
