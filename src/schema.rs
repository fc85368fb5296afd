//! Raw API document types and typed extension extraction
//!
//! The raw document is deserialized as-is; vendor extensions stay untyped
//! JSON until [`SchemaExtensions::extract`] validates them into strongly-typed
//! fields. Malformed extensions fail closed: the caller skips the definition
//! and records a warning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::group::ApiGroup;
use crate::version::ApiVersion;

pub const GVK_KEY: &str = "x-kubernetes-group-version-kind";
pub const RESOURCE_NAME_KEY: &str = "x-kubernetes-resource";
pub const PATCH_STRATEGY_KEY: &str = "x-kubernetes-patch-strategy";
pub const PATCH_MERGE_KEY_KEY: &str = "x-kubernetes-patch-merge-key";

const REF_PREFIXES: &[&str] = &["#/definitions/", "#/components/schemas/"];
const PARAMETER_REF_PREFIX: &str = "#/parameters/";

// =============================================================================
// Raw Document
// =============================================================================

/// A swagger-style API document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDocument {
    #[serde(default)]
    pub info: DocumentInfo,
    /// Fully qualified definition key -> schema
    #[serde(default)]
    pub definitions: BTreeMap<String, Value>,
    /// Path -> path item
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    /// Global parameters addressable via `#/parameters/<name>`
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// All operations available on one path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub get: Option<RawOperation>,
    #[serde(default)]
    pub put: Option<RawOperation>,
    #[serde(default)]
    pub post: Option<RawOperation>,
    #[serde(default)]
    pub delete: Option<RawOperation>,
    #[serde(default)]
    pub patch: Option<RawOperation>,
    #[serde(default)]
    pub head: Option<RawOperation>,
    /// Parameters shared by every operation on this path
    #[serde(default)]
    pub parameters: Vec<Value>,
}

impl PathItem {
    /// (HTTP method, operation) pairs in a fixed order
    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &RawOperation)> {
        [
            ("GET", &self.get),
            ("PUT", &self.put),
            ("POST", &self.post),
            ("DELETE", &self.delete),
            ("PATCH", &self.patch),
            ("HEAD", &self.head),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "operationId", default)]
    pub operation_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    /// Status code -> response
    #[serde(default)]
    pub responses: BTreeMap<String, RawResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schema: Option<Value>,
}

impl ApiDocument {
    pub fn from_json_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Merge another document into this one. Existing keys win.
    pub fn merge(&mut self, other: ApiDocument) {
        if self.info.title.is_none() {
            self.info.title = other.info.title;
        }
        if self.info.version.is_none() {
            self.info.version = other.info.version;
        }
        for (key, schema) in other.definitions {
            self.definitions.entry(key).or_insert(schema);
        }
        for (path, item) in other.paths {
            self.paths.entry(path).or_insert(item);
        }
        for (name, param) in other.parameters {
            self.parameters.entry(name).or_insert(param);
        }
    }

    /// Resolve a parameter that may be a `#/parameters/<name>` reference
    pub fn resolve_parameter<'a>(&'a self, param: &'a Value) -> Option<&'a Value> {
        match param.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let name = reference.strip_prefix(PARAMETER_REF_PREFIX)?;
                self.parameters.get(name)
            }
            None => Some(param),
        }
    }
}

// =============================================================================
// References
// =============================================================================

/// Strip the document-local prefix from a `$ref`: `#/definitions/a.v1.B` -> `a.v1.B`
pub fn normalize_ref(reference: &str) -> &str {
    REF_PREFIXES
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))
        .unwrap_or(reference)
}

/// The `$ref` target of a schema node, normalized
pub fn schema_ref(schema: &Value) -> Option<&str> {
    schema.get("$ref").and_then(Value::as_str).map(normalize_ref)
}

/// Display name of a referenced definition key: `io.k8s.api.core.v1.Pod` -> `Pod`
pub fn key_kind_name(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}

/// `$ref` of a schema or of the element type of an array/map schema
pub fn element_ref(schema: &Value) -> Option<&str> {
    if let Some(target) = schema_ref(schema) {
        return Some(target);
    }
    if let Some(items) = schema.get("items").filter(|v| v.is_object()) {
        return element_ref(items);
    }
    schema
        .get("additionalProperties")
        .filter(|v| v.is_object())
        .and_then(element_ref)
}

/// Display type of a schema node: `Pod`, `[]Container`, `map[string]Quantity`,
/// `int32`, `[]byte`
pub fn type_display(schema: &Value) -> String {
    if let Some(target) = schema_ref(schema) {
        return key_kind_name(target).to_string();
    }
    if let Some(items) = schema.get("items").filter(|v| v.is_object()) {
        return format!("[]{}", type_display(items));
    }
    if let Some(values) = schema.get("additionalProperties").filter(|v| v.is_object()) {
        return format!("map[string]{}", type_display(values));
    }
    match schema.get("format").and_then(Value::as_str) {
        Some("byte") => "[]byte".to_string(),
        Some(format) if !format.is_empty() => format.to_string(),
        _ => match schema.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(Value::Array(types)) => types
                .iter()
                .find_map(Value::as_str)
                .unwrap_or("object")
                .to_string(),
            _ => "object".to_string(),
        },
    }
}

// =============================================================================
// Group / Version / Kind
// =============================================================================

/// Group/Version/Kind identity of a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gvk {
    /// Short group (`apps`, `core`)
    pub group: ApiGroup,
    /// Group exactly as the extension spelled it (`apps`, `networking.k8s.io`, empty for core)
    pub full_group: Option<String>,
    pub version: ApiVersion,
    pub kind: String,
}

/// Outcome of guessing a GVK from a definition key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyGvk {
    Found(Gvk),
    /// Unversioned helper types (`…pkg.util.intstr.IntOrString`)
    Unversioned,
    Malformed,
}

/// Guess the GVK from a fully qualified key.
///
/// `io.k8s.api.apps.v1.Deployment` -> apps/v1/Deployment,
/// `io.k8s.apimachinery.pkg.api.resource.Quantity` -> core/resource/Quantity,
/// `g.v1.Pod` -> g/v1/Pod.
pub fn guess_gvk(key: &str) -> KeyGvk {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return KeyGvk::Malformed;
    }
    let kind = parts[parts.len() - 1];
    let version = parts[parts.len() - 2];
    let group = parts[parts.len() - 3];

    let group = match group {
        "api" => "core",
        "util" | "pkg" | "runtime" => return KeyGvk::Unversioned,
        other => other,
    };
    if matches!(version, "util" | "pkg" | "runtime") {
        return KeyGvk::Unversioned;
    }

    KeyGvk::Found(Gvk {
        group: ApiGroup::new(group),
        full_group: None,
        version: ApiVersion::new(version),
        kind: kind.to_string(),
    })
}

// =============================================================================
// Extensions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtensionError {
    #[error("{key} is neither a GVK object nor an array of them")]
    NotAGvk { key: &'static str },
    #[error("{key} member '{member}' is missing or not a string")]
    BadMember { key: &'static str, member: &'static str },
    #[error("{key} is not a string")]
    NotAString { key: &'static str },
}

/// Typed vendor extensions of a schema node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaExtensions {
    /// Declared GVK. `None` when absent or ambiguous (several GVKs).
    pub gvk: Option<Gvk>,
    /// Plural resource name hint
    pub resource: Option<String>,
    pub patch_strategy: Option<String>,
    pub patch_merge_key: Option<String>,
}

impl SchemaExtensions {
    pub fn extract(schema: &Value) -> Result<Self, ExtensionError> {
        Ok(Self {
            gvk: extract_gvk(schema)?,
            resource: string_extension(schema, RESOURCE_NAME_KEY)?,
            patch_strategy: string_extension(schema, PATCH_STRATEGY_KEY)?,
            patch_merge_key: string_extension(schema, PATCH_MERGE_KEY_KEY)?,
        })
    }
}

fn string_extension(schema: &Value, key: &'static str) -> Result<Option<String>, ExtensionError> {
    match schema.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ExtensionError::NotAString { key }),
    }
}

fn extract_gvk(schema: &Value) -> Result<Option<Gvk>, ExtensionError> {
    let Some(extension) = schema.get(GVK_KEY) else {
        return Ok(None);
    };

    let gvk_map = match extension {
        Value::Array(entries) => match entries.as_slice() {
            [] => return Ok(None),
            [single] => single,
            // shared types such as DeleteOptions list every group
            _ => return Ok(None),
        },
        other => other,
    };
    let Some(gvk_map) = gvk_map.as_object() else {
        return Err(ExtensionError::NotAGvk { key: GVK_KEY });
    };

    let member = |name: &'static str| {
        gvk_map
            .get(name)
            .and_then(Value::as_str)
            .ok_or(ExtensionError::BadMember { key: GVK_KEY, member: name })
    };
    let group = member("group")?;
    let version = member("version")?;
    let kind = member("kind")?;

    Ok(Some(Gvk {
        group: ApiGroup::from_full_name(group),
        full_group: Some(group.to_string()),
        version: ApiVersion::new(version),
        kind: kind.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_ref() {
        assert_eq!(normalize_ref("#/definitions/io.k8s.api.core.v1.Pod"), "io.k8s.api.core.v1.Pod");
        assert_eq!(normalize_ref("#/components/schemas/g.v1.Pod"), "g.v1.Pod");
        assert_eq!(normalize_ref("g.v1.PodSpec"), "g.v1.PodSpec");
    }

    #[test]
    fn test_type_display() {
        assert_eq!(type_display(&json!({"$ref": "#/definitions/io.k8s.api.core.v1.PodSpec"})), "PodSpec");
        assert_eq!(
            type_display(&json!({"type": "array", "items": {"$ref": "#/definitions/g.v1.Container"}})),
            "[]Container"
        );
        assert_eq!(
            type_display(&json!({"type": "object", "additionalProperties": {"$ref": "g.v1.Quantity"}})),
            "map[string]Quantity"
        );
        assert_eq!(type_display(&json!({"type": "integer", "format": "int32"})), "int32");
        assert_eq!(type_display(&json!({"type": "string", "format": "byte"})), "[]byte");
        assert_eq!(type_display(&json!({"type": "array", "items": {"type": "string"}})), "[]string");
        assert_eq!(type_display(&json!({})), "object");
    }

    #[test]
    fn test_element_ref_through_collections() {
        let schema = json!({"type": "array", "items": {"type": "object", "additionalProperties": {"$ref": "#/definitions/g.v1.Volume"}}});
        assert_eq!(element_ref(&schema), Some("g.v1.Volume"));
        assert_eq!(element_ref(&json!({"type": "array", "items": {"type": "string"}})), None);
    }

    #[test]
    fn test_guess_gvk() {
        match guess_gvk("io.k8s.api.apps.v1.Deployment") {
            KeyGvk::Found(gvk) => {
                assert_eq!(gvk.group.as_str(), "apps");
                assert_eq!(gvk.version.as_str(), "v1");
                assert_eq!(gvk.kind, "Deployment");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
        match guess_gvk("io.k8s.apimachinery.pkg.api.resource.Quantity") {
            KeyGvk::Found(gvk) => {
                assert_eq!(gvk.group.as_str(), "core");
                assert_eq!(gvk.version.as_str(), "resource");
            }
            other => panic!("Expected Found, got {:?}", other),
        }
        assert_eq!(guess_gvk("io.k8s.apimachinery.pkg.util.intstr.IntOrString"), KeyGvk::Unversioned);
        assert_eq!(guess_gvk("io.k8s.apimachinery.pkg.runtime.RawExtension"), KeyGvk::Unversioned);
        assert_eq!(guess_gvk("Pod"), KeyGvk::Malformed);
        assert_eq!(guess_gvk("a..b"), KeyGvk::Malformed);
    }

    #[test]
    fn test_extract_gvk_array_and_object() {
        let schema = json!({
            GVK_KEY: [{"group": "networking.k8s.io", "version": "v1", "kind": "Ingress"}]
        });
        let ext = SchemaExtensions::extract(&schema).unwrap();
        let gvk = ext.gvk.unwrap();
        assert_eq!(gvk.group.as_str(), "networking");
        assert_eq!(gvk.full_group.as_deref(), Some("networking.k8s.io"));
        assert_eq!(gvk.kind, "Ingress");

        let schema = json!({ GVK_KEY: {"group": "", "version": "v1", "kind": "Pod"} });
        let gvk = SchemaExtensions::extract(&schema).unwrap().gvk.unwrap();
        assert_eq!(gvk.group.as_str(), "core");
    }

    #[test]
    fn test_extract_ambiguous_gvk_is_none() {
        let schema = json!({
            GVK_KEY: [
                {"group": "", "version": "v1", "kind": "DeleteOptions"},
                {"group": "apps", "version": "v1", "kind": "DeleteOptions"}
            ]
        });
        assert_eq!(SchemaExtensions::extract(&schema).unwrap().gvk, None);
    }

    #[test]
    fn test_malformed_extensions_fail_closed() {
        let schema = json!({ GVK_KEY: "apps/v1/Deployment" });
        assert_eq!(
            SchemaExtensions::extract(&schema),
            Err(ExtensionError::NotAGvk { key: GVK_KEY })
        );

        let schema = json!({ GVK_KEY: {"group": "apps", "version": 1, "kind": "Deployment"} });
        assert_eq!(
            SchemaExtensions::extract(&schema),
            Err(ExtensionError::BadMember { key: GVK_KEY, member: "version" })
        );

        let schema = json!({ PATCH_STRATEGY_KEY: ["merge"] });
        assert!(SchemaExtensions::extract(&schema).is_err());
    }

    #[test]
    fn test_patch_extensions() {
        let schema = json!({
            PATCH_STRATEGY_KEY: "merge",
            PATCH_MERGE_KEY_KEY: "name",
            RESOURCE_NAME_KEY: "deployments"
        });
        let ext = SchemaExtensions::extract(&schema).unwrap();
        assert_eq!(ext.patch_strategy.as_deref(), Some("merge"));
        assert_eq!(ext.patch_merge_key.as_deref(), Some("name"));
        assert_eq!(ext.resource.as_deref(), Some("deployments"));
    }

    #[test]
    fn test_merge_documents_keeps_first() {
        let mut a: ApiDocument = serde_json::from_value(json!({
            "info": {"title": "Kubernetes"},
            "definitions": {"g.v1.Pod": {"description": "first"}}
        }))
        .unwrap();
        let b: ApiDocument = serde_json::from_value(json!({
            "info": {"title": "Other"},
            "definitions": {
                "g.v1.Pod": {"description": "second"},
                "g.v1.Node": {}
            }
        }))
        .unwrap();
        a.merge(b);
        assert_eq!(a.info.title.as_deref(), Some("Kubernetes"));
        assert_eq!(a.definitions.len(), 2);
        assert_eq!(a.definitions["g.v1.Pod"]["description"], "first");
    }

    #[test]
    fn test_resolve_parameter_reference() {
        let doc: ApiDocument = serde_json::from_value(json!({
            "parameters": {"body-abc": {"name": "body", "in": "body"}}
        }))
        .unwrap();
        let reference = json!({"$ref": "#/parameters/body-abc"});
        assert_eq!(doc.resolve_parameter(&reference).unwrap()["in"], "body");
        let missing = json!({"$ref": "#/parameters/nope"});
        assert!(doc.resolve_parameter(&missing).is_none());
    }
}
