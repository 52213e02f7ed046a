//! Subsystem-tagged log macro.

/// `tracing` event with a `subsystem` field in front of the caller's fields.
///
/// ```rust,ignore
/// log_event!(warn, "admission", "Sweep failed", error = %e);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        ::tracing::$level!(subsystem = $subsystem, $($($field)*,)? $msg)
    };
}
