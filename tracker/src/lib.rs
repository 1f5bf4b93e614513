pub mod canvas;
pub mod comparator;
pub mod constants;
pub mod design;
pub mod errors;
pub mod eta;
pub mod history;
pub mod quantizer;
pub mod store;
pub mod tracker;

pub use canvas::PixelBuffer;
pub use comparator::{Comparator, Template};
pub use design::TemplateDesign;
pub use errors::TemplateError;
pub use eta::Eta;
pub use history::ActivityHistogram;
pub use quantizer::QuantizeOptions;
pub use store::DesignStore;
pub use tracker::{ActivityCounts, ProgressTracker};
