//! # PingOne Provider
//!
//! Declarative management of PingOne environments: resource servers and
//! their scopes, applications and their grants, identity providers, the
//! directory and sign-on policies.
//!
//! The host owns desired and observed state. This crate supplies the
//! reconcilers that converge them, registered by type name in a
//! [`declarative::Registry`] built by [`provider::Provider`].
//!
//! ```no_run
//! use pingone_provider::config::ProviderConfig;
//! use pingone_provider::provider::Provider;
//!
//! let config = ProviderConfig::load()?;
//! let registry = Provider::configure(&config)?.registry();
//! assert!(registry.get("pingone_resource_scope").is_some());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod lookup;
pub mod provider;
pub mod resources;
pub mod validators;

#[cfg(test)]
mod testing;
