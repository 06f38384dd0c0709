// Adapters: concrete inputs for the loader, isochrone and raster ports.

pub mod ascii_grid;
pub mod memory;
pub mod scenario;

pub use ascii_grid::AsciiGridDirectory;
pub use memory::{MemoryRasterSource, MemoryScenario};
pub use scenario::ScenarioFile;
