//! The seam between the reconciler and whatever produces desired objects.

use hashroll_core::ManagedResource;

use crate::engine::Manifest;
use crate::error::ManifestError;

/// Supplies a fresh desired object per manifest, once per reconciliation pass.
///
/// `trusted_ca` is the physical name of the current versioned config; only
/// the workload manifest uses it. Construction may fail (bad template, bad
/// override), and that failure is fatal for the pass.
pub trait ManifestSource {
    fn render(
        &self,
        manifest: Manifest,
        trusted_ca: Option<&str>,
    ) -> Result<ManagedResource, ManifestError>;
}

impl<S: ManifestSource + ?Sized> ManifestSource for &S {
    fn render(
        &self,
        manifest: Manifest,
        trusted_ca: Option<&str>,
    ) -> Result<ManagedResource, ManifestError> {
        (**self).render(manifest, trusted_ca)
    }
}
