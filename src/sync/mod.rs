pub mod coordinator;
pub mod poller;
pub mod reconciler;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use coordinator::RateTracker;
pub use poller::{PollerHandle, RatePoller};
pub use reconciler::{BarReconciler, RefreshOutcome};
pub use snapshot::TrackerSnapshot;
