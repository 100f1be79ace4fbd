mod buffer;
mod entity;
pub mod interpolation;
pub mod render;
mod registry;

pub use buffer::{DEFAULT_SNAPSHOT_CAPACITY, SnapshotBuffer};
pub use entity::{EntityFlags, EntityKind, EntityState, Snapshot};
pub use interpolation::{DEFAULT_MAX_EXTRAPOLATION_MS, estimate_velocity};
pub use registry::{DEFAULT_POSITION_SMOOTHING, EntityRegistry};
pub use render::{DEFAULT_INTERPOLATION_DELAY_MS, MIN_MAX_BEHIND_MS, RenderWindow};
