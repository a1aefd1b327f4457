//! # hashroll-manifests
//!
//! Tera-based manifest factory that renders the desired objects of a
//! component from its [`ComponentConfig`](hashroll_core::ComponentConfig).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hashroll_core::config;
//! use hashroll_manifests::{Manifest, ManifestFactory, ManifestSource};
//!
//! fn render_all() {
//!     let Ok(config) = config::load() else { return };
//!     if let Ok(factory) = ManifestFactory::new(&config) {
//!         for manifest in Manifest::all() {
//!             if let Ok(resource) = factory.render(*manifest, None) {
//!                 println!("{}", resource.key());
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod source;

pub use context::ManifestContext;
pub use engine::{Manifest, ManifestFactory, TemplateEngine};
pub use error::ManifestError;
pub use source::ManifestSource;
