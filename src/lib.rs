pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod live;

pub use error::ForecastError;
