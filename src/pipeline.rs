//! Generation pipeline
//!
//! One linear pass from a raw API document to a finished [`DocumentModel`]:
//!
//! 1. ingest definitions (GVK extraction, skip rules, reference edges)
//! 2. classify (version demotion, appears-in, inline detection)
//! 3. ingest and bind operations
//! 4. table of contents
//! 5. cleanup and end-of-run report
//!
//! Every stage consumes the complete output of the previous one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::DocsConfig;
use crate::error::{DocsError, Result};
use crate::graph::{
    compute_reference_cycles, demote_old_versions, detect_inline_definitions, index_appears_in, loader,
    CycleAnalysis, DefinitionGraph, DefinitionId, Diagnostics,
};
use crate::group::ApiGroup;
use crate::operations::{bind_by_path, bind_operations, collect_orphans, ingest_operations, Operations};
use crate::schema::ApiDocument;
use crate::version::ApiVersion;

/// Fuzzy suggestions offered for a TOC entry that does not exist
const TOC_SUGGESTIONS: usize = 3;

// =============================================================================
// Table of Contents
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocResource {
    pub name: String,
    pub group: ApiGroup,
    pub version: ApiVersion,
    pub notes: Option<String>,
    pub definition: DefinitionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocCategory {
    pub name: String,
    /// Name of the include fragment for this category
    pub include: String,
    pub resources: Vec<TocResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOfContents {
    pub categories: Vec<TocCategory>,
}

impl TableOfContents {
    pub fn resource_count(&self) -> usize {
        self.categories.iter().map(|c| c.resources.len()).sum()
    }

    pub fn contains(&self, id: DefinitionId) -> bool {
        self.categories
            .iter()
            .any(|c| c.resources.iter().any(|r| r.definition == id))
    }
}

// =============================================================================
// Document Model
// =============================================================================

/// Finished, cross-referenced model handed to a
/// [`DocumentSink`](crate::sink::DocumentSink)
#[derive(Debug, Clone)]
pub struct DocumentModel {
    pub title: String,
    /// Hash of the ingested document
    pub bundle_hash: String,
    pub graph: DefinitionGraph,
    pub operations: Operations,
    /// Operation ids no definition claimed, excluding configured exclusions
    pub orphaned_operations: Vec<String>,
    pub toc: TableOfContents,
    pub cycles: CycleAnalysis,
    pub diagnostics: Diagnostics,
}

impl DocumentModel {
    /// Full group name -> observed versions, newest first
    pub fn group_versions(&self) -> &BTreeMap<String, Vec<ApiVersion>> {
        self.graph.group_versions()
    }

    /// Definitions listed as top-level entries: not old, not inlined
    pub fn current_definitions(&self) -> impl Iterator<Item = DefinitionId> + '_ {
        self.graph
            .iter()
            .filter(|d| !d.is_old_version && !d.is_inlined)
            .map(|d| d.id)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Run the full pipeline over one (possibly merged) API document.
///
/// Recoverable anomalies end up in [`DocumentModel::diagnostics`]. A document
/// without definitions, binding conflicts, duplicate definitions and orphaned
/// definitions in strict mode abort the run.
pub fn build(document: &ApiDocument, config: &DocsConfig) -> Result<DocumentModel> {
    if document.definitions.is_empty() {
        return Err(DocsError::InvalidDocument("document contains no definitions".to_string()));
    }
    let mut diags = Diagnostics::new();

    let mut graph = loader::build_graph(document, config, &mut diags)?;
    info!(definitions = graph.len(), edges = graph.edge_count(), "Loaded definitions");

    demote_old_versions(&mut graph);
    index_appears_in(&mut graph);
    detect_inline_definitions(&mut graph);

    let mut operations = ingest_operations(document, &mut graph, &mut diags);
    info!(operations = operations.len(), "Loaded operations");

    bind_operations(&mut graph, &mut operations, config)?;
    if config.toc.generate_from_groups {
        bind_by_path(&mut graph, &mut operations);
    }
    let orphaned_operations = collect_orphans(&operations, config, &mut diags);

    let toc = if config.toc.generate_from_groups {
        toc_from_groups(&mut graph, config)
    } else {
        toc_from_config(&mut graph, config, &mut diags)
    };
    debug!(categories = toc.categories.len(), resources = toc.resource_count(), "Built table of contents");

    clean_up(&mut graph);

    let cycles = compute_reference_cycles(&graph);
    let orphaned_definitions = report(&graph, &cycles, config, &mut diags);

    if config.generation.strict && !orphaned_definitions.is_empty() {
        return Err(DocsError::OrphanedDefinitions(orphaned_definitions));
    }

    if !config.generation.build_operations {
        debug!("Operations disabled, dropping bound operations");
        for id in graph.ids().collect::<Vec<_>>() {
            graph.get_mut(id).operation_categories.clear();
        }
        operations.clear();
    }

    Ok(DocumentModel {
        title: document.info.title.clone().unwrap_or_default(),
        bundle_hash: graph.bundle_hash.clone(),
        graph,
        operations,
        orphaned_operations,
        toc,
        cycles,
        diagnostics: diags,
    })
}

/// Visit the configured resource categories. Found definitions are marked
/// `in_toc`; missing ones are dropped with a suggestion diagnostic.
fn toc_from_config(graph: &mut DefinitionGraph, config: &DocsConfig, diags: &mut Diagnostics) -> TableOfContents {
    let mut toc = TableOfContents::default();
    for category in &config.resource_categories {
        let mut resources = Vec::new();
        for resource in &category.resources {
            let group = ApiGroup::new(resource.group.as_str());
            let Some(id) = graph.get_by_version_kind(group.as_str(), &resource.version, &resource.name) else {
                let label = format!("{}/{}/{}", group, resource.version, resource.name);
                warn!(resource = %label, "Could not find definition for resource in table of contents");
                let suggestions: Vec<String> = graph
                    .search(&resource.name, TOC_SUGGESTIONS)
                    .into_iter()
                    .map(|id| graph.label(id))
                    .collect();
                diags.missing_toc_resource(&label, &suggestions);
                continue;
            };
            graph.get_mut(id).in_toc = true;
            resources.push(TocResource {
                name: resource.name.clone(),
                group,
                version: ApiVersion::new(resource.version.as_str()),
                notes: resource.notes.clone(),
                definition: id,
            });
        }
        if resources.is_empty() && config.generation.prune_empty_categories {
            debug!(category = %category.name, "Pruning empty category");
            continue;
        }
        toc.categories.push(TocCategory {
            name: category.name.clone(),
            include: category.include.clone(),
            resources,
        });
    }
    toc
}

/// One category per observed group. Everything with bound operations that
/// is not an old version goes in; the rest is pruned.
fn toc_from_groups(graph: &mut DefinitionGraph, config: &DocsConfig) -> TableOfContents {
    let mut by_group: BTreeMap<ApiGroup, Vec<DefinitionId>> = BTreeMap::new();
    for definition in graph.iter() {
        if definition.name.ends_with("List") || definition.name.ends_with("Status") || definition.is_deprecated() {
            continue;
        }
        by_group.entry(definition.group.clone()).or_default().push(definition.id);
    }

    let promoted: Vec<DefinitionId> = graph
        .iter()
        .filter(|d| d.has_operations() && !d.is_old_version)
        .map(|d| d.id)
        .collect();
    for id in promoted {
        graph.get_mut(id).in_toc = true;
    }

    // BTreeMap iteration follows group precedence
    let mut toc = TableOfContents::default();
    for (group, mut ids) in by_group {
        ids.sort_by(|a, b| {
            let (a, b) = (graph.get(*a), graph.get(*b));
            a.name.cmp(&b.name).then_with(|| b.version.cmp(&a.version))
        });
        let resources: Vec<TocResource> = ids
            .into_iter()
            .map(|id| graph.get(id))
            .filter(|d| d.in_toc)
            .map(|d| TocResource {
                name: d.name.clone(),
                group: d.group.clone(),
                version: d.version.clone(),
                notes: None,
                definition: d.id,
            })
            .collect();
        if resources.is_empty() && config.generation.prune_empty_categories {
            continue;
        }
        toc.categories.push(TocCategory {
            name: group.display_name(),
            include: group.as_str().to_string(),
            resources,
        });
    }
    toc
}

/// Sort `appears_in` (name, newest version, group) and fields (name);
/// drop repeated `appears_in` entries.
fn clean_up(graph: &mut DefinitionGraph) {
    for id in graph.ids().collect::<Vec<_>>() {
        let mut appears_in = std::mem::take(&mut graph.get_mut(id).appears_in);
        appears_in.sort_by(|a, b| compare_listing(graph, *a, *b));
        appears_in.dedup_by(|a, b| {
            let (a, b) = (graph.get(*a), graph.get(*b));
            a.name == b.name && a.group == b.group && a.version == b.version
        });

        let definition = graph.get_mut(id);
        definition.appears_in = appears_in;
        definition.fields.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

fn compare_listing(graph: &DefinitionGraph, a: DefinitionId, b: DefinitionId) -> Ordering {
    let (a, b) = (graph.get(a), graph.get(b));
    a.name
        .cmp(&b.name)
        .then_with(|| b.version.cmp(&a.version))
        .then_with(|| a.group.cmp(&b.group))
}

/// Record end-of-run diagnostics and return the orphaned definition keys
fn report(graph: &DefinitionGraph, cycles: &CycleAnalysis, config: &DocsConfig, diags: &mut Diagnostics) -> Vec<String> {
    let mut orphaned = Vec::new();
    for definition in graph.iter() {
        if !definition.found_in_field && !definition.found_in_operation && !config.is_orphan_ignored(&definition.key) {
            diags.orphaned_definition(&definition.key);
            orphaned.push(definition.key.clone());
        }
        if definition.has_operations() && !definition.is_old_version && !definition.is_inlined && !definition.in_toc {
            diags.operations_not_in_toc(&definition.key);
        }
    }

    for group in &cycles.groups {
        let members: Vec<String> = group.members.iter().map(|id| graph.label(*id)).collect();
        diags.reference_cycle(&members);
    }

    if !orphaned.is_empty() {
        warn!(count = orphaned.len(), "Orphaned definitions");
    }
    orphaned
}
