pub mod annotator;
pub mod encoder;
pub mod pipeline;
pub mod screenshot;
pub mod traits;
pub mod types;
