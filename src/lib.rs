//! Kubernetes API Reference Model
//!
//! Turns an OpenAPI (swagger 2) description of the Kubernetes API into a
//! cross-referenced, de-duplicated, ordered document model ready to be
//! rendered as reference documentation.
//!
//! ## Features
//!
//! - **Definition Graph**: every schema definition keyed by group/version/kind,
//!   with cycle-safe reference resolution and an appears-in index
//! - **Classification**: old versions, inlined companions (`PodSpec` under `Pod`)
//! - **Operation Binding**: operation ids matched against naming templates,
//!   each operation owned by at most one definition
//! - **Diagnostics**: recoverable anomalies collected and reported at the end
//!
//! ## Pipeline
//!
//! ```text
//! *.json ──load──▶ ApiDocument
//!                     │
//!                     ▼
//!             DefinitionGraph ──classify──▶ bind operations ──▶ TOC
//!                                                                │
//!                                                                ▼
//!                                 DocumentSink ◀── DocumentModel (+ Diagnostics)
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod group;
pub mod operations;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod version;

pub use config::DocsConfig;
pub use error::{DocsError, Result};
pub use graph::{Definition, DefinitionGraph, DefinitionId, DefinitionKey, Diagnostics};
pub use group::ApiGroup;
pub use operations::{Operation, Operations};
pub use pipeline::{build, DocumentModel, TableOfContents};
pub use schema::ApiDocument;
pub use sink::{DocumentSink, JsonSink};
pub use version::ApiVersion;
