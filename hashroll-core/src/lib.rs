//! hashroll core library: resource model, label selectors, component config, errors.
//!
//! - [`types`] — [`ResourceKind`], [`ObjectMeta`], [`ManagedResource`]
//! - [`selector`] — equality-based [`LabelSelector`]
//! - [`config`] — [`ComponentConfig`] load / save
//! - [`error`] — [`ConfigError`], [`ResourceError`]

pub mod config;
pub mod error;
pub mod selector;
pub mod types;

pub use config::{ComponentConfig, LabelKeys, TrustedCaConfig};
pub use error::{ConfigError, ResourceError};
pub use selector::{LabelSelector, Requirement};
pub use types::{ManagedResource, ObjectKey, ObjectMeta, ResourceKind};
