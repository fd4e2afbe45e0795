// ABOUTME: Clock synchronization: time filter (A) and probe driver (B)

pub mod filter;
pub mod probe;

pub use filter::{FilterParams, SharedTimeFilter, TimeFilter, TimeFilterState, CONVERGED_ERROR_US, MIN_CONVERGED};
pub use probe::ProbeDriver;
