//! Configuration for a documentation generation run
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (apidocs.toml)
//! - Environment variables (APIDOCS__*)
//!
//! ## Example config file (apidocs.toml):
//! ```toml
//! excluded_operations = ["connectCoreV1", "getCodeVersion"]
//!
//! [generation]
//! build_operations = true
//! strict = false
//!
//! [operation_group_map]
//! rbac = "RbacAuthorization"
//!
//! [group_full_names]
//! rbac = "rbac.authorization.k8s.io"
//!
//! [[resource_categories]]
//! name = "Workloads APIs"
//! include = "workloads"
//! resources = [{ name = "Deployment", group = "apps", version = "v1" }]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration, passed explicitly into [`crate::pipeline::build`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Categories appended after the built-in ones
    #[serde(default)]
    pub operation_categories: Vec<OperationCategoryConfig>,

    /// Operation id substrings that are expected to stay unbound
    #[serde(default)]
    pub excluded_operations: Vec<String>,

    /// Lowercase short group -> group token used inside operation ids
    #[serde(default = "default_operation_group_map")]
    pub operation_group_map: BTreeMap<String, String>,

    /// Short group -> fully qualified group name
    #[serde(default)]
    pub group_full_names: BTreeMap<String, String>,

    /// Hand-written table of contents
    #[serde(default)]
    pub resource_categories: Vec<ResourceCategoryConfig>,

    #[serde(default)]
    pub toc: TocConfig,

    /// Definition key substrings that are never ingested
    #[serde(default = "default_skip_definitions")]
    pub skip_definitions: Vec<String>,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Keep bound operations in the finished model
    #[serde(default = "default_true")]
    pub build_operations: bool,

    /// Treat orphaned definitions as a hard error
    #[serde(default)]
    pub strict: bool,

    /// Drop TOC categories left without resources
    #[serde(default = "default_true")]
    pub prune_empty_categories: bool,
}

/// A named group of operation types, e.g. "Write Operations"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCategoryConfig {
    pub name: String,
    #[serde(default)]
    pub operation_types: Vec<OperationTypeConfig>,
}

/// One template rule: `Create` -> `create${group}${version}(Namespaced)?${resource}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTypeConfig {
    pub name: String,
    #[serde(rename = "match")]
    pub template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCategoryConfig {
    pub name: String,
    #[serde(default)]
    pub include: String,
    #[serde(default)]
    pub resources: Vec<ResourceRefConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRefConfig {
    pub name: String,
    /// Short group; empty means core
    #[serde(default)]
    pub group: String,
    pub version: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TocConfig {
    /// Build one category per observed group instead of `resource_categories`
    #[serde(default)]
    pub generate_from_groups: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Definition key substrings left out of the orphaned-definition report
    #[serde(default = "default_ignore_orphaned")]
    pub ignore_orphaned_definitions: Vec<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_operation_group_map() -> BTreeMap<String, String> {
    [
        ("rbac", "RbacAuthorization"),
        ("flowcontrol", "FlowcontrolApiserver"),
        ("internal", "InternalApiserver"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_skip_definitions() -> Vec<String> {
    vec!["JSONSchemaPropsOrStringArray".to_string()]
}

fn default_ignore_orphaned() -> Vec<String> {
    vec!["meta.v1.APIVersions".to_string(), "meta.v1.Patch".to_string()]
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            build_operations: true,
            strict: false,
            prune_empty_categories: true,
        }
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            operation_categories: Vec::new(),
            excluded_operations: Vec::new(),
            operation_group_map: default_operation_group_map(),
            group_full_names: BTreeMap::new(),
            resource_categories: Vec::new(),
            toc: TocConfig::default(),
            skip_definitions: default_skip_definitions(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            ignore_orphaned_definitions: default_ignore_orphaned(),
        }
    }
}

// =============================================================================
// Built-in operation categories
// =============================================================================

fn category(name: &str, types: &[(&str, &str)]) -> OperationCategoryConfig {
    OperationCategoryConfig {
        name: name.to_string(),
        operation_types: types
            .iter()
            .map(|(name, template)| OperationTypeConfig {
                name: name.to_string(),
                template: template.to_string(),
            })
            .collect(),
    }
}

/// Categories every run binds against, in display order
pub fn builtin_operation_categories() -> Vec<OperationCategoryConfig> {
    vec![
        category(
            "Write Operations",
            &[
                ("Create", "create${group}${version}(Namespaced)?${resource}"),
                ("Create Eviction", "create${group}${version}(Namespaced)?${resource}Eviction"),
                ("Patch", "patch${group}${version}(Namespaced)?${resource}"),
                ("Replace", "replace${group}${version}(Namespaced)?${resource}"),
                ("Delete", "delete${group}${version}(Namespaced)?${resource}"),
                ("Delete Collection", "delete${group}${version}Collection(Namespaced)?${resource}"),
            ],
        ),
        category(
            "Read Operations",
            &[
                ("Read", "read${group}${version}(Namespaced)?${resource}"),
                ("List", "list${group}${version}(Namespaced)?${resource}"),
                ("List All Namespaces", "list${group}${version}(Namespaced)?${resource}ForAllNamespaces"),
                ("Watch", "watch${group}${version}(Namespaced)?${resource}"),
                ("Watch List", "watch${group}${version}(Namespaced)?${resource}List"),
                (
                    "Watch List All Namespaces",
                    "watch${group}${version}(Namespaced)?${resource}ListForAllNamespaces",
                ),
            ],
        ),
        category(
            "Status Operations",
            &[
                ("Patch Status", "patch${group}${version}(Namespaced)?${resource}Status"),
                ("Read Status", "read${group}${version}(Namespaced)?${resource}Status"),
                ("Replace Status", "replace${group}${version}(Namespaced)?${resource}Status"),
            ],
        ),
        category(
            "Resize Operations",
            &[
                ("Read Resize", "read${group}${version}(Namespaced)?${resource}Resize"),
                ("Patch Resize", "patch${group}${version}(Namespaced)?${resource}Resize"),
                ("Replace Resize", "replace${group}${version}(Namespaced)?${resource}Resize"),
            ],
        ),
        category(
            "EphemeralContainers Operations",
            &[
                (
                    "Patch EphemeralContainers",
                    "patch${group}${version}(Namespaced)?${resource}Ephemeralcontainers",
                ),
                (
                    "Read EphemeralContainers",
                    "read${group}${version}(Namespaced)?${resource}Ephemeralcontainers",
                ),
                (
                    "Replace EphemeralContainers",
                    "replace${group}${version}(Namespaced)?${resource}Ephemeralcontainers",
                ),
            ],
        ),
    ]
}

impl DocsConfig {
    /// Load configuration from the default locations plus an optional file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["apidocs.toml", ".apidocs.toml", "config/apidocs.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("io", "k8s", "apidocs") {
            let xdg_config = config_dir.config_dir().join("apidocs.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // APIDOCS__GENERATION__STRICT=true
        builder = builder.add_source(
            Environment::with_prefix("APIDOCS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Built-in categories followed by the configured ones
    pub fn effective_operation_categories(&self) -> Vec<OperationCategoryConfig> {
        let mut categories = builtin_operation_categories();
        categories.extend(self.operation_categories.iter().cloned());
        categories
    }

    pub fn is_operation_excluded(&self, operation_id: &str) -> bool {
        self.excluded_operations
            .iter()
            .any(|pattern| operation_id.contains(pattern.as_str()))
    }

    pub fn is_definition_skipped(&self, key: &str) -> bool {
        self.skip_definitions.iter().any(|pattern| key.contains(pattern.as_str()))
    }

    pub fn is_orphan_ignored(&self, key: &str) -> bool {
        self.diagnostics
            .ignore_orphaned_definitions
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
    }
}
