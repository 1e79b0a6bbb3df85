//! Metrics for the upload pipeline.
//!
//! Events are recorded through the `metrics` facade. The loader itself does
//! not install an exporter; an embedding application can install any
//! recorder before running a job.

pub mod events;

/// Emit an internal event.
///
/// ```ignore
/// use sfbulk_core::emit;
/// use sfbulk_core::metrics::events::BatchesSent;
///
/// emit!(BatchesSent { count: 1, object: "Account".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;
