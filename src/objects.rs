//! Helpers for mirrored JSON objects
//!
//! Remote objects are JSON documents carrying a `metadata` block:
//!
//! ```json
//! {"metadata": {"name": "web", "namespace": "default", "labels": {"app": "web"}}}
//! ```
//!
//! Keys are `<namespace>/<name>`, or just `<name>` for objects without a
//! namespace.

use crate::store::{index_func, key_func, ExtractError, Indexer, KeyFunc};
use serde_json::Value;

/// Name of the index that files objects under their namespace
pub const NAMESPACE_INDEX: &str = "namespace";

fn metadata_str<'a>(obj: &'a Value, field: &str) -> Result<Option<&'a str>, ExtractError> {
    let metadata = obj
        .get("metadata")
        .ok_or_else(|| ExtractError::MissingField("metadata".to_string()))?;
    if !metadata.is_object() {
        return Err(ExtractError::UnexpectedShape(
            "metadata is not an object".to_string(),
        ));
    }

    match metadata.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ExtractError::UnexpectedShape(format!(
            "metadata.{field} is not a string"
        ))),
    }
}

/// `<namespace>/<name>` for namespaced objects, `<name>` otherwise
pub fn meta_namespace_key(obj: &Value) -> Result<String, ExtractError> {
    let name = metadata_str(obj, "name")?
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ExtractError::MissingField("metadata.name".to_string()))?;

    match metadata_str(obj, "namespace")? {
        Some(ns) if !ns.is_empty() => Ok(format!("{ns}/{name}")),
        _ => Ok(name.to_string()),
    }
}

/// Split a key produced by [`meta_namespace_key`] into `(namespace, name)`
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str), ExtractError> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] => Ok((None, *name)),
        [namespace, name] => Ok((Some(*namespace), *name)),
        _ => Err(ExtractError::InvalidKey(key.to_string())),
    }
}

/// Index function filing an object under its namespace (empty for none)
pub fn namespace_index(obj: &Value) -> Result<Vec<String>, ExtractError> {
    let namespace = metadata_str(obj, "namespace")?.unwrap_or_default();
    Ok(vec![namespace.to_string()])
}

pub fn meta_namespace_key_func() -> KeyFunc<Value> {
    key_func(meta_namespace_key)
}

pub fn namespace_indexer() -> Indexer<Value> {
    index_func(namespace_index)
}

/// Index function over the value at a JSON pointer (RFC 6901)
///
/// - string → that string
/// - number / bool → its text form
/// - array → each scalar element
/// - null or missing → no values
/// - object → error
pub fn json_pointer_indexer(pointer: impl Into<String>) -> Indexer<Value> {
    let pointer = pointer.into();
    index_func(move |obj: &Value| pointer_values(obj, &pointer))
}

fn pointer_values(obj: &Value, pointer: &str) -> Result<Vec<String>, ExtractError> {
    let Some(value) = obj.pointer(pointer) else {
        return Ok(Vec::new());
    };

    match value {
        Value::Array(elements) => elements
            .iter()
            .filter(|e| !e.is_null())
            .map(|e| {
                scalar_text(e).ok_or_else(|| {
                    ExtractError::UnexpectedShape(format!("{pointer} holds a nested value"))
                })
            })
            .collect(),
        Value::Object(_) => Err(ExtractError::UnexpectedShape(format!(
            "{pointer} holds an object"
        ))),
        other => Ok(scalar_text(other).into_iter().collect()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IndexFunc;
    use serde_json::json;

    #[test]
    fn test_meta_namespace_key() {
        let namespaced = json!({"metadata": {"name": "web", "namespace": "default"}});
        assert_eq!(meta_namespace_key(&namespaced).unwrap(), "default/web");

        let cluster_scoped = json!({"metadata": {"name": "node-1"}});
        assert_eq!(meta_namespace_key(&cluster_scoped).unwrap(), "node-1");

        let empty_ns = json!({"metadata": {"name": "node-1", "namespace": ""}});
        assert_eq!(meta_namespace_key(&empty_ns).unwrap(), "node-1");
    }

    #[test]
    fn test_meta_namespace_key_errors() {
        assert!(matches!(
            meta_namespace_key(&json!({"spec": {}})),
            Err(ExtractError::MissingField(_))
        ));
        assert!(matches!(
            meta_namespace_key(&json!({"metadata": {"namespace": "default"}})),
            Err(ExtractError::MissingField(_))
        ));
        assert!(matches!(
            meta_namespace_key(&json!({"metadata": {"name": 7}})),
            Err(ExtractError::UnexpectedShape(_))
        ));
        assert!(matches!(
            meta_namespace_key(&json!({"metadata": "web"})),
            Err(ExtractError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_split_meta_namespace_key() {
        assert_eq!(split_meta_namespace_key("web").unwrap(), (None, "web"));
        assert_eq!(
            split_meta_namespace_key("default/web").unwrap(),
            (Some("default"), "web")
        );
        assert!(split_meta_namespace_key("a/b/c").is_err());
    }

    #[test]
    fn test_namespace_index() {
        let obj = json!({"metadata": {"name": "web", "namespace": "prod"}});
        assert_eq!(namespace_index(&obj).unwrap(), vec!["prod"]);

        let obj = json!({"metadata": {"name": "node-1"}});
        assert_eq!(namespace_index(&obj).unwrap(), vec![""]);
    }

    #[test]
    fn test_json_pointer_indexer() {
        let obj = json!({
            "metadata": {"name": "web", "labels": {"app": "web", "tier": null}},
            "spec": {"replicas": 3, "ports": [80, 443], "paused": false, "groups": ["a", "b"]}
        });

        let values = |p: &str| json_pointer_indexer(p).values(&obj);

        assert_eq!(values("/metadata/labels/app").unwrap(), vec!["web"]);
        assert_eq!(values("/spec/replicas").unwrap(), vec!["3"]);
        assert_eq!(values("/spec/paused").unwrap(), vec!["false"]);
        assert_eq!(values("/spec/ports").unwrap(), vec!["80", "443"]);
        assert_eq!(values("/spec/groups").unwrap(), vec!["a", "b"]);
        assert!(values("/metadata/labels/tier").unwrap().is_empty());
        assert!(values("/metadata/labels/missing").unwrap().is_empty());
        assert!(values("/metadata/labels").is_err());
    }
}
