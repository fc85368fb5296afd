//! Operation Template Binder
//!
//! Matches operation ids against every definition's expanded templates and
//! attaches each hit to exactly one definition. An id claimed by a second
//! definition is a hard error.
//!
//! When the table of contents is generated from groups, sub-resource
//! operations no template claimed are bound afterwards by their path.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::template::{expand_template, group_token};
use super::{OperationType, Operations};
use crate::config::DocsConfig;
use crate::error::{DocsError, Result};
use crate::graph::{BoundCategory, Definition, DefinitionGraph, DefinitionId, Diagnostics};
use crate::group::title_case;

/// Token creation is a sub-resource of ServiceAccount, but documented under
/// TokenRequest (authentication/v1), which no template can express.
pub const TOKEN_REQUEST_OPERATION: &str = "createCoreV1NamespacedServiceAccountToken";
const TOKEN_REQUEST_GROUP: &str = "authentication";
const TOKEN_REQUEST_VERSION: &str = "v1";
const TOKEN_REQUEST_KIND: &str = "TokenRequest";
const TOKEN_REQUEST_TYPE: &str = "Create";
const TOKEN_REQUEST_CATEGORY: &str = "Write Operations";

/// Sub-resource left to the status templates
const STATUS_SUBRESOURCE: &str = "status";

enum Claim {
    Bound,
    AlreadyOwned,
    Missing,
}

/// Bind `operation_id` to `definition` unless it is missing or already
/// bound to it. Binding to a second definition fails.
fn claim(
    graph: &DefinitionGraph,
    operations: &mut Operations,
    operation_id: &str,
    definition: DefinitionId,
    operation_type: &OperationType,
) -> Result<Claim> {
    let Some(operation) = operations.get_mut(operation_id) else {
        return Ok(Claim::Missing);
    };
    match operation.definition {
        Some(existing) if existing == definition => Ok(Claim::AlreadyOwned),
        Some(existing) => Err(DocsError::BindingConflict {
            operation: operation_id.to_string(),
            first: graph.get(existing).definition_key().to_string(),
            second: graph.get(definition).definition_key().to_string(),
        }),
        None => {
            operation.definition = Some(definition);
            operation.operation_type = Some(operation_type.clone());
            Ok(Claim::Bound)
        }
    }
}

/// Bind operations to definitions through the effective operation
/// categories, then apply the token request override.
///
/// Inlined definitions are not offered: a companion such as `PodStatus`
/// would otherwise claim its owner's status operations. TokenRequest is
/// bound only through the override.
pub fn bind_operations(
    graph: &mut DefinitionGraph,
    operations: &mut Operations,
    config: &DocsConfig,
) -> Result<()> {
    let categories = config.effective_operation_categories();
    let mut bound_total = 0usize;

    for id in graph.ids().collect::<Vec<_>>() {
        let definition = graph.get(id);
        if definition.is_inlined || is_token_request(definition) {
            continue;
        }
        let group = group_token(&definition.group, config);
        let version = definition.version.camel_case();
        let resource = definition.name.clone();

        let mut bound: Vec<BoundCategory> = Vec::new();
        for category in &categories {
            let mut operation_ids: Vec<String> = Vec::new();
            for rule in &category.operation_types {
                let operation_type = OperationType {
                    name: rule.name.clone(),
                    category: category.name.clone(),
                };
                for candidate in expand_template(&rule.template, &group, &version, &resource) {
                    match claim(graph, operations, &candidate, id, &operation_type)? {
                        Claim::Bound => operation_ids.push(candidate),
                        Claim::AlreadyOwned => {
                            debug!(operation = %candidate, definition = %graph.label(id), "Operation already bound");
                        }
                        Claim::Missing => {}
                    }
                }
            }
            if !operation_ids.is_empty() {
                bound_total += operation_ids.len();
                bound.push(BoundCategory {
                    name: category.name.clone(),
                    operations: operation_ids,
                });
            }
        }
        graph.get_mut(id).operation_categories = bound;
    }

    bind_token_request(graph, operations)?;

    info!(bound = bound_total, total = operations.len(), "Bound operations to definitions");
    Ok(())
}

fn is_token_request(definition: &Definition) -> bool {
    definition.name == TOKEN_REQUEST_KIND
        && definition.group.as_str() == TOKEN_REQUEST_GROUP
        && definition.version.as_str() == TOKEN_REQUEST_VERSION
}

fn bind_token_request(graph: &mut DefinitionGraph, operations: &mut Operations) -> Result<()> {
    let Some(id) = graph.get_by_version_kind(TOKEN_REQUEST_GROUP, TOKEN_REQUEST_VERSION, TOKEN_REQUEST_KIND) else {
        return Ok(());
    };
    let operation_type = OperationType {
        name: TOKEN_REQUEST_TYPE.to_string(),
        category: TOKEN_REQUEST_CATEGORY.to_string(),
    };
    if !matches!(
        claim(graph, operations, TOKEN_REQUEST_OPERATION, id, &operation_type)?,
        Claim::Bound
    ) {
        return Ok(());
    }

    let definition = graph.get_mut(id);
    match definition
        .operation_categories
        .iter_mut()
        .find(|c| c.name == TOKEN_REQUEST_CATEGORY)
    {
        Some(category) => category.operations.push(TOKEN_REQUEST_OPERATION.to_string()),
        None => definition.operation_categories.push(BoundCategory {
            name: TOKEN_REQUEST_CATEGORY.to_string(),
            operations: vec![TOKEN_REQUEST_OPERATION.to_string()],
        }),
    }
    definition.in_toc = true;
    debug!(operation = TOKEN_REQUEST_OPERATION, "Bound token request override");
    Ok(())
}

/// Bind unclaimed sub-resource operations to the definition whose group,
/// version and plural resource name match the operation path.
///
/// Each sub-resource gets its own category (`Scale Operations`) with types
/// named after the method (`GET Scale`). Status sub-resources and paths with
/// no matching definition are left alone. Returns the number bound.
pub fn bind_by_path(graph: &mut DefinitionGraph, operations: &mut Operations) -> usize {
    let mut by_resource: HashMap<(String, String, String), DefinitionId> = HashMap::new();
    for definition in graph.iter().filter(|d| !d.is_inlined) {
        let key = (
            definition.group.as_str().to_string(),
            definition.version.as_str().to_string(),
            definition.resource_name(),
        );
        by_resource.entry(key).or_insert(definition.id);
    }

    // definition -> sub-resource -> operation ids, sub-resources in name order
    let mut bound: BTreeMap<DefinitionId, BTreeMap<String, Vec<String>>> = BTreeMap::new();
    for operation in operations.values_mut().filter(|o| !o.is_bound()) {
        let Some(target) = operation.group_version_resource_subresource() else {
            continue;
        };
        let Some(subresource) = target.subresource.as_deref() else {
            continue;
        };
        if subresource == STATUS_SUBRESOURCE {
            continue;
        }
        let key = (target.group.as_str().to_string(), target.version.clone(), target.resource.clone());
        let Some(&id) = by_resource.get(&key) else {
            debug!(operation = %operation.id, target = %target, "No definition for operation path");
            continue;
        };

        let title = title_case(subresource);
        operation.definition = Some(id);
        operation.operation_type = Some(OperationType {
            name: format!("{} {}", operation.http_method, title),
            category: format!("{} Operations", title),
        });
        bound
            .entry(id)
            .or_default()
            .entry(subresource.to_string())
            .or_default()
            .push(operation.id.clone());
    }

    let mut total = 0usize;
    for (id, subresources) in bound {
        let definition = graph.get_mut(id);
        for (subresource, operation_ids) in subresources {
            total += operation_ids.len();
            let name = format!("{} Operations", title_case(&subresource));
            match definition.operation_categories.iter_mut().find(|c| c.name == name) {
                Some(category) => category.operations.extend(operation_ids),
                None => definition.operation_categories.push(BoundCategory {
                    name,
                    operations: operation_ids,
                }),
            }
        }
    }
    if total > 0 {
        info!(bound = total, "Bound sub-resource operations by path");
    }
    total
}

/// Ids of operations no definition claimed, excluding configured
/// exclusions. Both kinds are recorded as diagnostics.
pub fn collect_orphans(operations: &Operations, config: &DocsConfig, diags: &mut Diagnostics) -> Vec<String> {
    let mut orphans = Vec::new();
    for operation in operations.values().filter(|o| !o.is_bound()) {
        if config.is_operation_excluded(&operation.id) {
            debug!(operation = %operation.id, "Operation excluded");
            diags.excluded_operation(&operation.id);
            continue;
        }
        warn!(operation = %operation.id, path = %operation.path, "No definition found for operation");
        let location = match operation.group_version_resource_subresource() {
            Some(target) => format!("{} ({})", operation.display_http(), target),
            None => operation.display_http(),
        };
        diags.orphaned_operation(&operation.id, &location);
        orphans.push(operation.id.clone());
    }
    orphans
}
