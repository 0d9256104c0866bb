pub mod projection;
pub mod random;
pub mod stats;
pub mod vector;

pub use projection::{GeoBounds, GeoProjector, SF_BOUNDS};
pub use stats::StatsHelper;
pub use vector::Vec2;
