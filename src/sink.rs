//! Document sinks
//!
//! A sink receives the finished [`DocumentModel`] and renders it in one
//! output format. Arena ids never leave the crate: the serializable views
//! below refer to definitions by their `group/version/Kind` label.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::graph::{BoundCategory, CycleAnalysis, Definition, DefinitionGraph, DefinitionId, DiagnosticItem, Field};
use crate::operations::Operation;
use crate::pipeline::DocumentModel;

pub trait DocumentSink {
    fn write(&mut self, model: &DocumentModel) -> Result<()>;
}

// =============================================================================
// Serializable views
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentView<'a> {
    pub title: &'a str,
    pub bundle_hash: &'a str,
    pub definitions: Vec<DefinitionView<'a>>,
    pub operations: Vec<OperationView<'a>>,
    pub orphaned_operations: &'a [String],
    pub group_versions: BTreeMap<&'a str, Vec<&'a str>>,
    pub toc: Vec<TocCategoryView<'a>>,
    pub reference_cycles: Vec<Vec<String>>,
    pub diagnostics: &'a [DiagnosticItem],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionView<'a> {
    pub label: String,
    pub name: &'a str,
    pub group: &'a str,
    pub group_full_name: &'a str,
    pub version: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<&'a str>,
    pub fields: Vec<FieldView<'a>>,
    pub appears_in: Vec<String>,
    pub other_versions: Vec<String>,
    pub inline: Vec<String>,
    pub operation_categories: &'a [BoundCategory],
    pub is_old_version: bool,
    pub is_inlined: bool,
    pub in_toc: bool,
    pub in_reference_cycle: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub type_name: &'a str,
    pub description: &'a str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_strategy: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_merge_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationView<'a> {
    pub id: &'a str,
    pub http: String,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    pub path_params: Vec<FieldView<'a>>,
    pub query_params: Vec<FieldView<'a>>,
    pub body_params: Vec<FieldView<'a>>,
    pub responses: Vec<ResponseView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ResponseView<'a> {
    pub code: &'a str,
    pub description: &'a str,
    #[serde(rename = "type")]
    pub type_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TocCategoryView<'a> {
    pub name: &'a str,
    pub include: &'a str,
    pub resources: Vec<TocResourceView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct TocResourceView<'a> {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<&'a str>,
}

fn labels(graph: &DefinitionGraph, ids: &[DefinitionId]) -> Vec<String> {
    ids.iter().map(|id| graph.label(*id)).collect()
}

impl<'a> FieldView<'a> {
    fn new(graph: &DefinitionGraph, field: &'a Field) -> Self {
        Self {
            name: &field.name,
            type_name: &field.type_name,
            description: &field.description,
            required: field.required,
            patch_strategy: field.patch_strategy.as_deref(),
            patch_merge_key: field.patch_merge_key.as_deref(),
            definition: field.definition.map(|id| graph.label(id)),
        }
    }
}

impl<'a> DefinitionView<'a> {
    fn new(graph: &DefinitionGraph, cycles: &CycleAnalysis, definition: &'a Definition) -> Self {
        Self {
            label: graph.label(definition.id),
            name: &definition.name,
            group: definition.group.as_str(),
            group_full_name: &definition.group_full_name,
            version: definition.version.as_str(),
            description: &definition.description,
            resource: definition.extensions.resource.as_deref(),
            fields: definition.fields.iter().map(|f| FieldView::new(graph, f)).collect(),
            appears_in: labels(graph, &definition.appears_in),
            other_versions: labels(graph, &definition.other_versions),
            inline: labels(graph, &definition.inline),
            operation_categories: &definition.operation_categories,
            is_old_version: definition.is_old_version,
            is_inlined: definition.is_inlined,
            in_toc: definition.in_toc,
            in_reference_cycle: cycles.is_cyclic(definition.id),
        }
    }
}

impl<'a> OperationView<'a> {
    fn new(graph: &DefinitionGraph, operation: &'a Operation) -> Self {
        let params = |fields: &'a [Field]| -> Vec<FieldView<'a>> {
            fields.iter().map(|f| FieldView::new(graph, f)).collect()
        };
        Self {
            id: &operation.id,
            http: operation.display_http(),
            description: &operation.description,
            definition: operation.definition.map(|id| graph.label(id)),
            operation_type: operation.operation_type.as_ref().map(|t| t.name.as_str()),
            category: operation.operation_type.as_ref().map(|t| t.category.as_str()),
            path_params: params(&operation.path_params),
            query_params: params(&operation.query_params),
            body_params: params(&operation.body_params),
            responses: operation
                .responses
                .iter()
                .map(|r| ResponseView {
                    code: &r.code,
                    description: &r.description,
                    type_name: &r.type_name,
                    definition: r.definition.map(|id| graph.label(id)),
                })
                .collect(),
        }
    }
}

impl<'a> DocumentView<'a> {
    pub fn new(model: &'a DocumentModel) -> Self {
        let graph = &model.graph;
        Self {
            title: &model.title,
            bundle_hash: &model.bundle_hash,
            definitions: graph.iter().map(|d| DefinitionView::new(graph, &model.cycles, d)).collect(),
            operations: model.operations.values().map(|o| OperationView::new(graph, o)).collect(),
            orphaned_operations: &model.orphaned_operations,
            group_versions: model
                .group_versions()
                .iter()
                .map(|(group, versions)| (group.as_str(), versions.iter().map(|v| v.as_str()).collect()))
                .collect(),
            toc: model
                .toc
                .categories
                .iter()
                .map(|c| TocCategoryView {
                    name: &c.name,
                    include: &c.include,
                    resources: c
                        .resources
                        .iter()
                        .map(|r| TocResourceView {
                            label: graph.label(r.definition),
                            notes: r.notes.as_deref(),
                        })
                        .collect(),
                })
                .collect(),
            reference_cycles: model.cycles.groups.iter().map(|g| labels(graph, &g.members)).collect(),
            diagnostics: model.diagnostics.all(),
        }
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Writes the model as one JSON document
pub struct JsonSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: true }
    }

    pub fn compact(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DocumentSink for JsonSink<W> {
    fn write(&mut self, model: &DocumentModel) -> Result<()> {
        let view = DocumentView::new(model);
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, &view)?;
        } else {
            serde_json::to_writer(&mut self.writer, &view)?;
        }
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
