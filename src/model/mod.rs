pub mod color;
pub mod color_matrix;
pub mod light_set;
pub mod time_pattern;
pub mod units;

// Re-export commonly used types at the model level.
pub use color::Hsbk;
pub use color_matrix::{ColorMatrix, Rect, BODY_ROW, TOP_CELL};
pub use light_set::{DiscoveredLight, Light, LightSetHandle, SortedLightSet};
pub use time_pattern::TimePattern;
pub use units::UnitMode;
