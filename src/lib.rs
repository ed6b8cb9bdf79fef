// Internal modules required when compiled as a library for tests.
pub mod aggregate;
pub mod alerts;
pub mod app;
pub mod aqi;
pub mod config;
pub mod http;
pub mod metrics;
pub mod poller;
pub mod state;
pub mod upstream;
// Re-export commonly used types for tests
pub use aggregate::SeriesPoint;
pub use state::{AppSnapshots, SensorSnapshot, SharedState};
pub use upstream::{FetchWindow, WindowData};
