// Domain layer: core models and ports (interfaces).

pub mod model;
pub mod ports;
pub mod raster;
pub mod report;
pub mod settings;
