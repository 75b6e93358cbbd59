//! OpenAPI schema parsing.
//!
//! Turns a decoded OpenAPI document into a flat list of endpoint
//! descriptors, one per (path, method) pair, in document order. Pure and
//! total: missing or oddly-shaped keys become absent fields, never errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const HTTP_METHODS: [&str; 8] =
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// One (path, method) operation extracted from a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub path: String,
    /// Upper-cased HTTP method.
    pub method: String,
    /// First declared tag, if any.
    pub tag: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<ParsedParameter>,
    /// `application/json` request-body schema, if declared.
    pub request_body: Option<Value>,
    /// Response code -> { description, schema }.
    pub responses: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedParameter {
    pub name: String,
    /// Parameter location: path, query, header, or cookie.
    #[serde(rename = "in")]
    pub location: String,
    pub description: Option<String>,
    pub required: bool,
    #[serde(rename = "type")]
    pub param_type: Option<String>,
    pub format: Option<String>,
}

/// Parses a decoded OpenAPI document into endpoint descriptors.
pub fn parse_document(document: &Value) -> Vec<EndpointDescriptor> {
    let mut endpoints = Vec::new();

    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };

    for (path, path_item) in paths {
        let Some(path_item) = path_item.as_object() else { continue };
        for (method, operation) in path_item {
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            endpoints.push(parse_operation(path, method, operation));
        }
    }

    endpoints
}

fn parse_operation(path: &str, method: &str, operation: &Value) -> EndpointDescriptor {
    let tag = operation
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.first())
        .and_then(Value::as_str)
        .map(String::from);

    let description = operation
        .get("description")
        .or_else(|| operation.get("summary"))
        .and_then(Value::as_str)
        .map(String::from);

    let parameters = operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(|params| params.iter().filter_map(parse_parameter).collect())
        .unwrap_or_default();

    let request_body = json_media_schema(operation.get("requestBody"));

    let mut responses = Map::new();
    if let Some(declared) = operation.get("responses").and_then(Value::as_object) {
        for (code, response) in declared {
            let description = response.get("description").cloned().unwrap_or(Value::Null);
            let schema = json_media_schema(Some(response)).unwrap_or(Value::Null);
            let mut entry = Map::new();
            entry.insert("description".to_string(), description);
            entry.insert("schema".to_string(), schema);
            responses.insert(code.clone(), Value::Object(entry));
        }
    }

    EndpointDescriptor {
        path: path.to_string(),
        method: method.to_uppercase(),
        tag,
        description,
        parameters,
        request_body,
        responses,
    }
}

fn parse_parameter(param: &Value) -> Option<ParsedParameter> {
    let name = param.get("name").and_then(Value::as_str)?;
    let location = param.get("in").and_then(Value::as_str).unwrap_or("query");

    // OpenAPI 3 nests type/format under `schema`; Swagger 2 keeps them inline.
    let schema = param.get("schema");
    let param_type = schema
        .and_then(|s| s.get("type"))
        .or_else(|| param.get("type"))
        .and_then(Value::as_str)
        .map(String::from);
    let format = schema
        .and_then(|s| s.get("format"))
        .or_else(|| param.get("format"))
        .and_then(Value::as_str)
        .map(String::from);

    Some(ParsedParameter {
        name: name.to_string(),
        location: location.to_string(),
        description: param.get("description").and_then(Value::as_str).map(String::from),
        required: param.get("required").and_then(Value::as_bool).unwrap_or(false),
        param_type,
        format,
    })
}

/// Extracts the `application/json` media-type schema from a requestBody or
/// response object.
fn json_media_schema(object: Option<&Value>) -> Option<Value> {
    object?
        .get("content")?
        .get("application/json")?
        .get("schema")
        .cloned()
}

/// Decodes uploaded schema bytes: YAML first, then JSON as a fallback.
pub fn decode_spec_bytes(bytes: &[u8]) -> Result<Value, String> {
    if let Ok(doc) = serde_yaml::from_slice::<Value>(bytes) {
        if doc.is_object() {
            return Ok(doc);
        }
    }
    serde_json::from_slice::<Value>(bytes)
        .map_err(|e| format!("schema is neither valid YAML nor JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "tags": ["pets"],
                        "summary": "List pets",
                        "parameters": [
                            {"name": "limit", "in": "query", "required": false,
                             "schema": {"type": "integer", "format": "int32"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "A list of pets",
                                "content": {"application/json": {"schema": {"type": "array"}}}
                            }
                        }
                    },
                    "post": {
                        "requestBody": {
                            "content": {"application/json": {"schema": {"type": "object"}}}
                        },
                        "responses": {"201": {"description": "Created"}}
                    }
                },
                "/pets/{petId}": {
                    "get": {
                        "parameters": [
                            {"name": "petId", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn one_descriptor_per_path_method_pair() {
        let endpoints = parse_document(&petstore());
        assert_eq!(endpoints.len(), 3);
        assert!(endpoints.iter().all(|e| e.method.chars().all(char::is_uppercase)));

        let methods: Vec<(&str, &str)> =
            endpoints.iter().map(|e| (e.path.as_str(), e.method.as_str())).collect();
        assert_eq!(methods, vec![("/pets", "GET"), ("/pets", "POST"), ("/pets/{petId}", "GET")]);
    }

    #[test]
    fn operation_fields_are_extracted() {
        let endpoints = parse_document(&petstore());
        let list = &endpoints[0];

        assert_eq!(list.tag.as_deref(), Some("pets"));
        assert_eq!(list.description.as_deref(), Some("List pets"));
        assert_eq!(list.parameters.len(), 1);
        assert_eq!(list.parameters[0].name, "limit");
        assert_eq!(list.parameters[0].location, "query");
        assert!(!list.parameters[0].required);
        assert_eq!(list.parameters[0].param_type.as_deref(), Some("integer"));
        assert_eq!(list.parameters[0].format.as_deref(), Some("int32"));
        assert!(list.request_body.is_none());
        assert_eq!(list.responses["200"]["schema"]["type"], "array");
        assert_eq!(list.responses["200"]["description"], "A list of pets");

        let create = &endpoints[1];
        assert_eq!(create.request_body.as_ref().unwrap()["type"], "object");
        assert_eq!(create.responses["201"]["schema"], Value::Null);
    }

    #[test]
    fn bare_operation_yields_empty_fields() {
        let doc = json!({"paths": {"/ping": {"get": {}}}});
        let endpoints = parse_document(&doc);
        assert_eq!(endpoints.len(), 1);
        let e = &endpoints[0];
        assert!(e.tag.is_none());
        assert!(e.parameters.is_empty());
        assert!(e.request_body.is_none());
        assert!(e.responses.is_empty());
    }

    #[test]
    fn malformed_shapes_do_not_panic() {
        assert!(parse_document(&json!({})).is_empty());
        assert!(parse_document(&json!({"paths": "nope"})).is_empty());
        assert!(parse_document(&json!({"paths": {"/x": "nope"}})).is_empty());

        // Non-method keys in a path item are ignored
        let doc = json!({"paths": {"/x": {"summary": "s", "parameters": [], "get": {}}}});
        assert_eq!(parse_document(&doc).len(), 1);
    }

    #[test]
    fn decode_accepts_yaml_and_json() {
        let yaml = b"openapi: 3.0.0\npaths:\n  /pets:\n    get: {}\n";
        let doc = decode_spec_bytes(yaml).unwrap();
        assert_eq!(parse_document(&doc).len(), 1);

        let json_bytes = br#"{"paths": {"/pets": {"get": {}}}}"#;
        let doc = decode_spec_bytes(json_bytes).unwrap();
        assert_eq!(parse_document(&doc).len(), 1);

        assert!(decode_spec_bytes(b"\x00\x01not a spec{{{").is_err());
    }
}
