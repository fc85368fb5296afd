//! Operation id templates
//!
//! A template such as `create${group}${version}(Namespaced)?${resource}`
//! expands to the namespaced and the cluster-scoped spelling of an operation
//! id for one definition.

use crate::config::DocsConfig;
use crate::group::{title_case, ApiGroup};

pub const GROUP_PLACEHOLDER: &str = "${group}";
pub const VERSION_PLACEHOLDER: &str = "${version}";
pub const RESOURCE_PLACEHOLDER: &str = "${resource}";
pub const NAMESPACED_TOKEN: &str = "(Namespaced)?";

/// Group token used inside operation ids: the configured mapping for the
/// lowercase group, else its title case (`apps` -> `Apps`)
pub fn group_token(group: &ApiGroup, config: &DocsConfig) -> String {
    config
        .operation_group_map
        .get(&group.as_str().to_lowercase())
        .cloned()
        .unwrap_or_else(|| title_case(group.as_str()))
}

/// Candidate operation ids for a template, namespaced spelling first.
///
/// Templates without the namespaced token yield a single candidate.
pub fn expand_template(template: &str, group: &str, version: &str, resource: &str) -> Vec<String> {
    let base = template
        .replace(GROUP_PLACEHOLDER, group)
        .replace(VERSION_PLACEHOLDER, version)
        .replace(RESOURCE_PLACEHOLDER, resource);

    let namespaced = base.replace(NAMESPACED_TOKEN, "Namespaced");
    let cluster = base.replace(NAMESPACED_TOKEN, "");
    if namespaced == cluster {
        vec![namespaced]
    } else {
        vec![namespaced, cluster]
    }
}
