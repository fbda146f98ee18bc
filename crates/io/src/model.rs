// Model import (JSON)
//
//   { "id": "mediastore", "kind": "architecture",
//     "instances": [ { "id": "c1", "name": "AuthService", "type": "BasicComponent" } ] }

use std::collections::BTreeSet;
use std::path::Path;

use tracelink_core::Model;
use tracing::info;

use crate::error::IoError;

pub fn load_model(path: &Path) -> Result<Model, IoError> {
    let content = std::fs::read_to_string(path).map_err(|e| IoError::read(path, e))?;
    parse_model(&content, path)
}

/// Parse and validate a model document: non-empty ids and names, unique
/// instance ids.
pub fn parse_model(content: &str, path: &Path) -> Result<Model, IoError> {
    let model: Model = serde_json::from_str(content).map_err(|e| IoError::json(path, e))?;
    if model.id.trim().is_empty() {
        return Err(IoError::invalid(path, "model id is empty"));
    }
    let mut seen = BTreeSet::new();
    for (i, instance) in model.instances.iter().enumerate() {
        if instance.id.trim().is_empty() {
            return Err(IoError::invalid(path, format!("instance {i}: empty id")));
        }
        if instance.name.trim().is_empty() {
            return Err(IoError::invalid(
                path,
                format!("instance '{}': empty name", instance.id),
            ));
        }
        if !seen.insert(instance.id.as_str()) {
            return Err(IoError::invalid(
                path,
                format!("duplicate instance id '{}'", instance.id),
            ));
        }
    }
    info!(model = %model.id, kind = %model.kind, instances = model.instances.len(), "model loaded");
    Ok(model)
}

/// Load several models; their ids must be distinct.
pub fn load_models(paths: &[impl AsRef<Path>]) -> Result<Vec<Model>, IoError> {
    let mut models: Vec<Model> = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let model = load_model(path)?;
        if models.iter().any(|m| m.id == model.id) {
            return Err(IoError::invalid(path, format!("duplicate model id '{}'", model.id)));
        }
        models.push(model);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracelink_core::ModelKind;

    fn parse(json: &str) -> Result<Model, IoError> {
        parse_model(json, Path::new("model.json"))
    }

    #[test]
    fn parses_instances_in_order() {
        let model = parse(
            r#"{ "id": "arch", "kind": "architecture", "instances": [
                { "id": "c1", "name": "AuthService", "type": "BasicComponent", "provided": ["i1"] },
                { "id": "c2", "name": "PaymentGateway", "type": "BasicComponent" } ] }"#,
        )
        .unwrap();
        assert_eq!(model.kind, ModelKind::Architecture);
        let ids: Vec<_> = model.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(model.instances[0].provided, vec!["i1".to_string()]);
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        let dup = r#"{ "id": "arch", "kind": "code", "instances": [
            { "id": "c1", "name": "A", "type": "Class" }, { "id": "c1", "name": "B", "type": "Class" } ] }"#;
        let err = parse(dup).unwrap_err();
        assert!(err.to_string().contains("duplicate instance id 'c1'"), "got: {err}");

        let unnamed = r#"{ "id": "arch", "kind": "code", "instances": [ { "id": "c1", "name": " ", "type": "Class" } ] }"#;
        assert!(matches!(parse(unnamed), Err(IoError::Invalid { .. })));

        let no_id = r#"{ "id": "", "kind": "code", "instances": [] }"#;
        assert!(matches!(parse(no_id), Err(IoError::Invalid { .. })));
    }

    #[test]
    fn unknown_kind_is_a_json_error() {
        let err = parse(r#"{ "id": "m", "kind": "uml", "instances": [] }"#).unwrap_err();
        assert!(matches!(err, IoError::Json { .. }));
    }

    #[test]
    fn model_ids_must_be_distinct_across_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let doc = r#"{ "id": "arch", "kind": "architecture", "instances": [] }"#;
        std::fs::write(&a, doc).unwrap();
        std::fs::write(&b, doc).unwrap();
        assert_eq!(load_models(&[&a]).unwrap().len(), 1);
        assert!(load_models(&[&a, &b]).is_err());
    }
}
