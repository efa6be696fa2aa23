pub mod cache;
pub mod registry;

pub use cache::ReconcilePolicy;
pub use registry::{Registry, SharedRegistry};
