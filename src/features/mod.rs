//! Registries built on top of containers.

#[cfg(feature = "namespace")]
pub mod namespace;

#[cfg(feature = "namespace")]
pub use namespace::Namespace;

#[cfg(feature = "factory")]
pub mod factory;

#[cfg(feature = "factory")]
pub use factory::Factory;
