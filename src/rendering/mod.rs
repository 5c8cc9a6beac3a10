// private sub-module defined in other files
mod colour_ramp;
mod compositor;
mod edges;
mod presets;

// exports identifiers from private sub-modules in the current module namespace
pub use self::colour_ramp::{ColourRamp, ColourStop, Rgba, TRANSPARENT};
pub use self::compositor::{
    composite, composite_cancellable, CompositeStyle, IndexKind, Layer, LayerStack, RgbaRaster,
    TerrainIndices, UnsharpMask,
};
pub use self::edges::EdgeOverlay;
pub use self::presets::Preset;
