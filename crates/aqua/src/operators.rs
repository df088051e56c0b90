//! 🧰 Low-code operator configs. Only forecasting so far.

pub mod forecast;

pub use forecast::{ForecastOperatorConfig, ForecastOperatorSpec};
