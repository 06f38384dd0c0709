pub mod dissolve;
pub mod engine;
pub mod fill;
pub mod normalize;
pub mod pipeline;
pub mod population;
pub mod resolve;

pub use crate::domain::model::{ExtractedInputs, ZoneAnalysis};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
