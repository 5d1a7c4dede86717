// # Registrar Client Implementations
//
// Only the in-memory registrar lives in core; the OVH client is in its own
// crate so core stays free of HTTP dependencies.

pub mod memory;

pub use memory::MemoryRegistrar;
