//! Definition Classification
//!
//! Three passes over the complete graph:
//! - appears-in indexing (reverse of the reference closure)
//! - inline detection (`PodSpec` renders nested under `Pod`)
//! - version demotion (only the preferred version of a kind is canonical)
//!
//! Each pass computes its results from an immutable view first and merges
//! them afterwards, so the writes into shared target lists are serialized.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use super::resolver::{resolve_references, ReferenceSet};
use super::{Definition, DefinitionGraph, DefinitionId};

/// Companion names documented nested under their owner, in display order
pub const INLINE_PATTERNS: &[&str] = &[
    "${resource}Spec",
    "${resource}Status",
    "${resource}List",
    "${resource}Strategy",
    "${resource}Rollback",
    "RollingUpdate${resource}",
    "${resource}EventSource",
];

// =============================================================================
// Appears-In
// =============================================================================

/// Record every definition in the `appears_in` list of each definition its
/// schema reaches, and mark those targets `found_in_field`.
pub fn index_appears_in(graph: &mut DefinitionGraph) {
    let closures: Vec<(DefinitionId, ReferenceSet)> = graph
        .ids()
        .map(|id| (id, resolve_references(graph, &graph.get(id).schema)))
        .collect();

    for (from, references) in closures {
        for target in references.resolved {
            let definition = graph.get_mut(target);
            definition.appears_in.push(from);
            definition.found_in_field = true;
        }
    }
}

// =============================================================================
// Inline Detection
// =============================================================================

/// Link same group/version companions (`<Kind>Spec`, `<Kind>Status`, ...)
/// into their owner's `inline` list and mark them inlined.
pub fn detect_inline_definitions(graph: &mut DefinitionGraph) {
    let mut found: Vec<(DefinitionId, DefinitionId)> = Vec::new();
    for owner in graph.iter() {
        for pattern in INLINE_PATTERNS {
            let name = pattern.replace("${resource}", &owner.name);
            if let Some(companion) =
                graph.get_by_version_kind(owner.group.as_str(), owner.version.as_str(), &name)
            {
                found.push((owner.id, companion));
            }
        }
    }

    for (owner, companion) in found {
        graph.get_mut(owner).inline.push(companion);
        let definition = graph.get_mut(companion);
        definition.is_inlined = true;
        definition.found_in_field = true;
    }
}

// =============================================================================
// Version Demotion
// =============================================================================

/// Preference order among definitions sharing a kind: group precedence
/// first, then newest version first. `Less` means preferred.
pub fn compare_kind_precedence(a: &Definition, b: &Definition) -> Ordering {
    a.group
        .cmp(&b.group)
        .then_with(|| b.version.cmp(&a.version))
}

pub fn sort_by_kind_precedence(graph: &DefinitionGraph, ids: &mut [DefinitionId]) {
    ids.sort_by(|a, b| compare_kind_precedence(graph.get(*a), graph.get(*b)));
}

/// Mark all but the preferred definition of each kind as old and fill
/// `other_versions` with the same-kind definitions at a different version.
pub fn demote_old_versions(graph: &mut DefinitionGraph) {
    let mut by_kind: BTreeMap<String, Vec<DefinitionId>> = BTreeMap::new();
    for definition in graph.iter() {
        by_kind.entry(definition.name.clone()).or_default().push(definition.id);
    }
    for ids in by_kind.values_mut() {
        sort_by_kind_precedence(graph, ids);
    }

    let mut others: Vec<(DefinitionId, Vec<DefinitionId>)> = Vec::new();
    for (kind, ids) in &by_kind {
        if ids.len() <= 1 {
            continue;
        }
        debug!(
            kind = %kind,
            current = %graph.label(ids[0]),
            old = ?ids[1..].iter().map(|id| graph.label(*id)).collect::<Vec<_>>(),
            "Demoting old versions"
        );
        for &id in ids {
            let version = &graph.get(id).version;
            let other: Vec<DefinitionId> = ids
                .iter()
                .copied()
                .filter(|o| &graph.get(*o).version != version)
                .collect();
            others.push((id, other));
        }
    }

    for ids in by_kind.values().filter(|ids| ids.len() > 1) {
        for &old in &ids[1..] {
            graph.get_mut(old).is_old_version = true;
        }
    }
    for (id, other) in others {
        graph.get_mut(id).other_versions = other;
    }
}
