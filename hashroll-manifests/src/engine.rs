//! Tera rendering engine — [`Manifest`] enum and [`ManifestFactory`].
//!
//! # Manifest mapping
//!
//! | Manifest               | Kind               | Object name                           |
//! |------------------------|--------------------|---------------------------------------|
//! | ServingCertsCaBundle   | ConfigMap          | `<component>-serving-certs-ca-bundle` |
//! | ServiceAccount         | ServiceAccount     | `<component>`                         |
//! | ClusterRole            | ClusterRole        | `<component>`                         |
//! | ClusterRoleBinding     | ClusterRoleBinding | `<component>`                         |
//! | ClusterRoleBindingView | ClusterRoleBinding | `<component>-view`                    |
//! | Service                | Service            | `<component>`                         |
//! | Secret                 | Secret             | `<component>`                         |
//! | Deployment             | Deployment         | `<component>`                         |
//! | ServiceMonitor         | ServiceMonitor     | `<component>`                         |

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tera::Tera;

use hashroll_core::{ComponentConfig, ManagedResource, ResourceKind};

use crate::context::ManifestContext;
use crate::error::ManifestError;
use crate::source::ManifestSource;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_metadata.tera", include_str!("templates/_partials/metadata.tera")),
    (
        "serving_certs_ca_bundle.yaml.tera",
        include_str!("templates/serving_certs_ca_bundle.yaml.tera"),
    ),
    ("service_account.yaml.tera", include_str!("templates/service_account.yaml.tera")),
    ("cluster_role.yaml.tera", include_str!("templates/cluster_role.yaml.tera")),
    (
        "cluster_role_binding.yaml.tera",
        include_str!("templates/cluster_role_binding.yaml.tera"),
    ),
    (
        "cluster_role_binding_view.yaml.tera",
        include_str!("templates/cluster_role_binding_view.yaml.tera"),
    ),
    ("service.yaml.tera", include_str!("templates/service.yaml.tera")),
    ("secret.yaml.tera", include_str!("templates/secret.yaml.tera")),
    ("deployment.yaml.tera", include_str!("templates/deployment.yaml.tera")),
    ("service_monitor.yaml.tera", include_str!("templates/service_monitor.yaml.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ManifestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, ManifestError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, ManifestError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Every desired object a component task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Manifest {
    ServingCertsCaBundle,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    ClusterRoleBindingView,
    Service,
    Secret,
    Deployment,
    ServiceMonitor,
}

impl Manifest {
    /// All manifests in a stable order.
    pub fn all() -> &'static [Manifest] {
        &[
            Manifest::ServingCertsCaBundle,
            Manifest::ServiceAccount,
            Manifest::ClusterRole,
            Manifest::ClusterRoleBinding,
            Manifest::ClusterRoleBindingView,
            Manifest::Service,
            Manifest::Secret,
            Manifest::Deployment,
            Manifest::ServiceMonitor,
        ]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            Manifest::ServingCertsCaBundle   => "serving_certs_ca_bundle.yaml.tera",
            Manifest::ServiceAccount         => "service_account.yaml.tera",
            Manifest::ClusterRole            => "cluster_role.yaml.tera",
            Manifest::ClusterRoleBinding     => "cluster_role_binding.yaml.tera",
            Manifest::ClusterRoleBindingView => "cluster_role_binding_view.yaml.tera",
            Manifest::Service                => "service.yaml.tera",
            Manifest::Secret                 => "secret.yaml.tera",
            Manifest::Deployment             => "deployment.yaml.tera",
            Manifest::ServiceMonitor         => "service_monitor.yaml.tera",
        }
    }

    /// Kind the rendered document must declare.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Manifest::ServingCertsCaBundle => ResourceKind::ConfigMap,
            Manifest::ServiceAccount => ResourceKind::ServiceAccount,
            Manifest::ClusterRole => ResourceKind::ClusterRole,
            Manifest::ClusterRoleBinding | Manifest::ClusterRoleBindingView => {
                ResourceKind::ClusterRoleBinding
            }
            Manifest::Service => ResourceKind::Service,
            Manifest::Secret => ResourceKind::Secret,
            Manifest::Deployment => ResourceKind::Deployment,
            Manifest::ServiceMonitor => ResourceKind::ServiceMonitor,
        }
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Manifest::ServingCertsCaBundle => "serving certs CA bundle ConfigMap",
            Manifest::ServiceAccount => "ServiceAccount",
            Manifest::ClusterRole => "ClusterRole",
            Manifest::ClusterRoleBinding => "ClusterRoleBinding",
            Manifest::ClusterRoleBindingView => "monitoring view ClusterRoleBinding",
            Manifest::Service => "Service",
            Manifest::Secret => "Secret",
            Manifest::Deployment => "Deployment",
            Manifest::ServiceMonitor => "ServiceMonitor",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded defaults.
/// Template names are normalised to lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, ManifestError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render `manifest` and parse the output into a resource.
    pub fn render(
        &self,
        ctx: &ManifestContext,
        manifest: Manifest,
    ) -> Result<ManagedResource, ManifestError> {
        let template = manifest.template_name();
        let text = self.tera.render(template, &ctx.to_tera_context()?)?;
        let resource = ManagedResource::from_yaml_str(&text)
            .map_err(|source| ManifestError::Resource { template, source })?;
        if resource.kind != manifest.kind() {
            return Err(ManifestError::KindMismatch {
                template,
                expected: manifest.kind(),
                found: resource.kind,
            });
        }
        Ok(resource)
    }
}

// ---------------------------------------------------------------------------
// ManifestFactory
// ---------------------------------------------------------------------------

/// Produces the desired objects of one component from its config.
///
/// Create once per config and reuse across passes; every call renders fresh.
pub struct ManifestFactory {
    engine: TemplateEngine,
    ctx: ManifestContext,
}

impl ManifestFactory {
    /// Embedded templates plus overrides from `config.templates_dir`.
    pub fn new(config: &ComponentConfig) -> Result<Self, ManifestError> {
        Ok(ManifestFactory {
            engine: TemplateEngine::new(config.templates_dir.as_deref())?,
            ctx: ManifestContext::from_config(config),
        })
    }

    pub fn context(&self) -> &ManifestContext {
        &self.ctx
    }
}

impl ManifestSource for ManifestFactory {
    fn render(
        &self,
        manifest: Manifest,
        trusted_ca: Option<&str>,
    ) -> Result<ManagedResource, ManifestError> {
        if trusted_ca.is_some() {
            self.engine.render(&self.ctx.with_trusted_ca(trusted_ca), manifest)
        } else {
            self.engine.render(&self.ctx, manifest)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
