pub mod features;
pub mod pipeline;
pub mod predictor;
pub mod scaler;

pub use features::*;
pub use pipeline::*;
pub use predictor::*;
pub use scaler::*;
