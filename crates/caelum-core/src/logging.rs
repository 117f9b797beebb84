//! Target-scoped tracing macros.
//!
//! All subsystems log through `tracing`; these macros pin the per-subsystem
//! targets so filters like `caelum::script=debug` work uniformly.

/// Trace script loading and step execution.
#[macro_export]
macro_rules! script_log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "caelum::script", $($arg)*)
    }
}

/// Trace addon discovery and component lifecycle.
#[macro_export]
macro_rules! addon_log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "caelum::addon", $($arg)*)
    }
}

/// Trace driver process supervision.
#[macro_export]
macro_rules! driver_log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "caelum::driver", $($arg)*)
    }
}
