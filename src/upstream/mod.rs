//! Upstream sensor-data service access: metric-name mapping, window
//! planning, and the resilient fetch client.

pub mod client;
pub mod fields;
pub mod window;

pub use client::{RegistryEntry, UpstreamClient, WindowData};
pub use fields::Field;
pub use window::{plan, FetchWindow};
