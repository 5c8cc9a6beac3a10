// private sub-module defined in other files
mod hillshade;
mod slope;
mod tpi;
mod tri;

// exports identifiers from private sub-modules in the current module namespace
pub use self::hillshade::{Hillshade, LightCombination, LightSource, Lighting};
pub use self::slope::{Slope, SlopeUnits};
pub use self::tpi::{Tpi, TpiMode};
pub use self::tri::Tri;
