//! Core traits for the OVH DNS reconciler
//!
//! This module defines the abstract interfaces of the external collaborators.
//!
//! - [`RegistrarClient`]: Read and mutate zone records
//! - [`IpSource`]: Discover the public IP address
//! - [`HealthProbe`] / [`Sleeper`]: Probe an endpoint and wait between attempts

pub mod registrar;
pub mod ip_source;
pub mod health_probe;

pub use registrar::RegistrarClient;
pub use ip_source::{IpSource, StaticIpSource};
pub use health_probe::{HealthProbe, Sleeper, TokioSleeper};
