//! Reference Cycle Analysis
//!
//! Computes strongly connected components of the direct reference graph.
//! Cycles are legal in API schemas; they are reported for information and
//! let renderers avoid expanding a type inside itself.

use petgraph::algo::kosaraju_scc;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{DefinitionGraph, DefinitionId};

/// A group of definitions that reference each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SccGroup {
    pub id: usize,
    /// Members in id order
    pub members: Vec<DefinitionId>,
    /// Single definition that references itself
    pub is_self_referential: bool,
}

/// Complete cycle analysis result for the graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleAnalysis {
    /// Only cycles with >1 member OR self-refs, ordered by smallest member
    pub groups: Vec<SccGroup>,
    members: HashSet<DefinitionId>,
}

impl CycleAnalysis {
    /// True if `id` takes part in a reference cycle
    pub fn is_cyclic(&self, id: DefinitionId) -> bool {
        self.members.contains(&id)
    }
}

pub fn compute_reference_cycles(graph: &DefinitionGraph) -> CycleAnalysis {
    let mut components: Vec<(Vec<DefinitionId>, bool)> = kosaraju_scc(&graph.graph)
        .into_iter()
        .filter_map(|scc| {
            let is_self_referential = scc.len() == 1
                && graph
                    .graph
                    .edges_directed(scc[0], Direction::Outgoing)
                    .any(|e| e.target() == scc[0]);
            if scc.len() == 1 && !is_self_referential {
                return None;
            }
            let mut members: Vec<DefinitionId> = scc
                .iter()
                .filter_map(|idx| graph.graph.node_weight(*idx).copied())
                .collect();
            members.sort();
            Some((members, is_self_referential))
        })
        .collect();

    // kosaraju order depends on traversal; make it deterministic
    components.sort_by(|a, b| a.0.first().cmp(&b.0.first()));

    let mut analysis = CycleAnalysis::default();
    for (id, (members, is_self_referential)) in components.into_iter().enumerate() {
        analysis.members.extend(members.iter().copied());
        analysis.groups.push(SccGroup {
            id,
            members,
            is_self_referential,
        });
    }
    analysis
}
