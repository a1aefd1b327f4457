//! The fixed, ordered step list for one component.
//!
//! `converge` walks the steps top-down with ensure-present, `teardown` walks
//! them bottom-up with ensure-absent. Both stop at the first failing step and
//! leave earlier steps applied; every step is idempotent, so the next pass
//! resumes where this one stopped.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{info, info_span, warn};

use hashroll_core::{ComponentConfig, ManagedResource, ObjectKey, ResourceKind};
use hashroll_manifests::context::DEFAULT_TRUSTED_CA_KEY;
use hashroll_manifests::{Manifest, ManifestSource};

use crate::error::{Operation, ReconcileError, TaskError};
use crate::reconciler::{Applied, Reconciler};
use crate::transport::ResourceTransport;
use crate::version::{self, VersionedConfig};

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ServingCertsCaBundle,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    ClusterRoleBindingView,
    Service,
    Secret,
    TrustedCaVersion,
    Deployment,
    ServiceMonitor,
}

impl Step {
    /// Steps in converge order; teardown runs them reversed.
    pub fn converge_order() -> &'static [Step] {
        &[
            Step::ServingCertsCaBundle,
            Step::ServiceAccount,
            Step::ClusterRole,
            Step::ClusterRoleBinding,
            Step::ClusterRoleBindingView,
            Step::Service,
            Step::Secret,
            Step::TrustedCaVersion,
            Step::Deployment,
            Step::ServiceMonitor,
        ]
    }

    /// The manifest a step applies; `None` for the version step.
    pub fn manifest(self) -> Option<Manifest> {
        match self {
            Step::ServingCertsCaBundle => Some(Manifest::ServingCertsCaBundle),
            Step::ServiceAccount => Some(Manifest::ServiceAccount),
            Step::ClusterRole => Some(Manifest::ClusterRole),
            Step::ClusterRoleBinding => Some(Manifest::ClusterRoleBinding),
            Step::ClusterRoleBindingView => Some(Manifest::ClusterRoleBindingView),
            Step::Service => Some(Manifest::Service),
            Step::Secret => Some(Manifest::Secret),
            Step::TrustedCaVersion => None,
            Step::Deployment => Some(Manifest::Deployment),
            Step::ServiceMonitor => Some(Manifest::ServiceMonitor),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.manifest() {
            Some(manifest) => write!(f, "{manifest}"),
            None => f.write_str("trusted CA bundle version"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Converge,
    Teardown,
}

impl Direction {
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Converge => "reconciling",
            Direction::Teardown => "deleting",
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub applied: Applied,
    /// Physical name of the current version (version step only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pruned: Vec<String>,
}

impl StepReport {
    fn applied(step: Step, applied: Applied) -> Self {
        StepReport {
            step,
            applied,
            version: None,
            pruned: Vec::new(),
        }
    }
}

/// Outcome of a pass that ran every step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub component: String,
    pub direction: Direction,
    pub steps: Vec<StepReport>,
}

impl PassReport {
    /// Whether any step wrote to the control plane.
    pub fn changed(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.applied.is_write() || !s.pruned.is_empty())
    }

    /// Current version name, if the pass produced one.
    pub fn version(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| s.version.as_deref())
    }
}

// ---------------------------------------------------------------------------
// ComponentTask
// ---------------------------------------------------------------------------

pub struct ComponentTask<T: ResourceTransport, M: ManifestSource> {
    config: ComponentConfig,
    transport: T,
    manifests: M,
}

impl<T: ResourceTransport, M: ManifestSource> ComponentTask<T, M> {
    pub fn new(config: ComponentConfig, transport: T, manifests: M) -> Self {
        ComponentTask {
            config,
            transport,
            manifests,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// Converge when `enabled`, tear down otherwise.
    pub fn run(&self, enabled: bool) -> Result<PassReport, TaskError> {
        if enabled {
            self.converge()
        } else {
            self.teardown()
        }
    }

    pub fn converge(&self) -> Result<PassReport, TaskError> {
        let span = info_span!("converge", component = %self.config.component);
        let _enter = span.enter();

        let mut steps = Vec::with_capacity(Step::converge_order().len());
        let mut current: Option<VersionedConfig> = None;
        for &step in Step::converge_order() {
            let report = self
                .converge_step(step, &mut current)
                .map_err(|source| self.fail(Direction::Converge, step, source))?;
            steps.push(report);
        }

        let pass = self.report(Direction::Converge, steps);
        info!(changed = pass.changed(), version = ?pass.version(), "converged");
        Ok(pass)
    }

    pub fn teardown(&self) -> Result<PassReport, TaskError> {
        let span = info_span!("teardown", component = %self.config.component);
        let _enter = span.enter();

        let mut steps = Vec::with_capacity(Step::converge_order().len());
        for &step in Step::converge_order().iter().rev() {
            let report = self
                .teardown_step(step)
                .map_err(|source| self.fail(Direction::Teardown, step, source))?;
            steps.push(report);
        }

        let pass = self.report(Direction::Teardown, steps);
        info!(changed = pass.changed(), "torn down");
        Ok(pass)
    }

    fn converge_step(
        &self,
        step: Step,
        current: &mut Option<VersionedConfig>,
    ) -> Result<StepReport, ReconcileError> {
        let reconciler = Reconciler::new(&self.transport);
        let Some(manifest) = step.manifest() else {
            return self.converge_trusted_ca(current);
        };

        let trusted_ca = current.as_ref().map(|v| v.name.as_str());
        let desired = self.build(manifest, trusted_ca)?;
        let applied = match step {
            // Filled in by the serving-cert signer; never overwrite.
            Step::ServingCertsCaBundle => reconciler.ensure_created(&desired)?,
            _ => reconciler.ensure_present(&desired)?,
        };
        Ok(StepReport::applied(step, applied))
    }

    /// Hash the source bundle, create its version, prune the others.
    ///
    /// The deployment step that follows points the workload at the new name.
    fn converge_trusted_ca(
        &self,
        current: &mut Option<VersionedConfig>,
    ) -> Result<StepReport, ReconcileError> {
        let step = Step::TrustedCaVersion;
        let trusted = &self.config.trusted_ca;
        let namespace = self.config.namespace.as_str();
        let source_key = ObjectKey::new(ResourceKind::ConfigMap, Some(namespace), &trusted.source);

        let source = match self.transport.get(&source_key) {
            Ok(obj) => obj,
            Err(e) if e.is_not_found() => {
                warn!(source = %source_key, "trusted CA source not found; skipping version");
                return Ok(StepReport::applied(step, Applied::Skipped));
            }
            Err(e) => return Err(ReconcileError::transport(Operation::Get, source_key, e)),
        };

        let key = trusted.key.as_deref().unwrap_or(DEFAULT_TRUSTED_CA_KEY);
        let data: BTreeMap<String, String> = source
            .string_map(&["data"])
            .into_iter()
            .filter(|(k, _)| k == key)
            .collect();
        let payload = version::payload_from_data(&data, key);

        let Some(versioned) = version::version(&trusted.logical_name, &payload)? else {
            warn!(source = %source_key, key, "trusted CA source has no data; skipping version");
            return Ok(StepReport::applied(step, Applied::Skipped));
        };

        let desired = versioned.to_config_map(namespace, &data, &self.config.labels);
        let applied = Reconciler::new(&self.transport).ensure_created(&desired)?;
        if applied == Applied::Created {
            info!(name = %versioned.name, hash = %versioned.hash, "new trusted CA version");
        }

        let pruned = version::prune_stale_versions(
            &self.transport,
            namespace,
            &versioned.logical_name,
            &versioned.hash,
            &self.config.labels,
        )?;

        let report = StepReport {
            step,
            applied,
            version: Some(versioned.name.clone()),
            pruned,
        };
        *current = Some(versioned);
        Ok(report)
    }

    fn teardown_step(&self, step: Step) -> Result<StepReport, ReconcileError> {
        let Some(manifest) = step.manifest() else {
            // The source config map belongs to whoever fills it; only the
            // versions are ours.
            let pruned = version::prune_all_versions(
                &self.transport,
                &self.config.namespace,
                &self.config.trusted_ca.logical_name,
                &self.config.labels,
            )?;
            let applied = if pruned.is_empty() {
                Applied::AlreadyAbsent
            } else {
                Applied::Deleted
            };
            return Ok(StepReport {
                step,
                applied,
                version: None,
                pruned,
            });
        };

        let desired = self.build(manifest, None)?;
        let applied = Reconciler::new(&self.transport).ensure_absent(&desired)?;
        Ok(StepReport::applied(step, applied))
    }

    fn build(
        &self,
        manifest: Manifest,
        trusted_ca: Option<&str>,
    ) -> Result<ManagedResource, ReconcileError> {
        self.manifests
            .render(manifest, trusted_ca)
            .map_err(|source| ReconcileError::Construction { manifest, source })
    }

    fn fail(&self, direction: Direction, step: Step, source: ReconcileError) -> TaskError {
        warn!(%step, error = %source, "{} failed", direction.verb());
        TaskError {
            component: self.config.component.clone(),
            direction,
            step,
            source,
        }
    }

    fn report(&self, direction: Direction, steps: Vec<StepReport>) -> PassReport {
        PassReport {
            component: self.config.component.clone(),
            direction,
            steps,
        }
    }
}
