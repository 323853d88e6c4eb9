//! Descriptor database under `<root>/db/`.
//!
//! Layout: `<root>/db/models/<id>.json` and `<root>/db/datasets/<id>.json`.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::descriptor::{validate_id, DatasetDescriptor, ModelDescriptor};
use crate::error::{EntityKind, Result, SabathError};

/// Read-only view of the descriptor database.
#[derive(Debug, Clone)]
pub struct Catalog {
    db_dir: PathBuf,
}

impl Catalog {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            db_dir: root.as_ref().join("db"),
        }
    }

    fn path_for(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.db_dir
            .join(kind.catalog_dir())
            .join(format!("{id}.json"))
    }

    fn load_value(&self, kind: EntityKind, id: &str) -> Result<Value> {
        validate_id(id)?;
        let path = self.path_for(kind, id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SabathError::UnknownEntity {
                    kind,
                    id: id.to_string(),
                    path,
                })
            }
            Err(e) => return Err(e.into()),
        };
        debug!(kind = %kind, id = %id, path = %path.display(), "loaded descriptor");
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_model(&self, id: &str) -> Result<ModelDescriptor> {
        ModelDescriptor::from_json(self.load_value(EntityKind::Model, id)?)
    }

    pub fn load_dataset(&self, id: &str) -> Result<DatasetDescriptor> {
        DatasetDescriptor::from_json(self.load_value(EntityKind::Dataset, id)?)
    }

    /// Load a model and, if it lists any, its first dataset.
    pub fn load_run_inputs(&self, id: &str) -> Result<(ModelDescriptor, Option<DatasetDescriptor>)> {
        let model = self.load_model(id)?;
        let dataset = match model.primary_dataset() {
            Some(ds) => Some(self.load_dataset(ds)?),
            None => None,
        };
        Ok((model, dataset))
    }

    /// Sorted ids of every descriptor of `kind`. A missing directory is empty.
    pub fn list(&self, kind: EntityKind) -> Result<Vec<String>> {
        let dir = self.db_dir.join(kind.catalog_dir());
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(root: &Path, kind: &str, id: &str, value: Value) {
        let dir = root.join("db").join(kind);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{id}.json")), value.to_string()).unwrap();
    }

    #[test]
    fn test_load_run_inputs_with_dataset() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "models",
            "M1",
            json!({"id": "M1", "run": "true", "datasets": ["D1", "D2"]}),
        );
        write(
            tmp.path(),
            "datasets",
            "D1",
            json!({"id": "D1", "download": {"shell": "true"}}),
        );

        let catalog = Catalog::new(tmp.path());
        let (model, dataset) = catalog.load_run_inputs("M1").unwrap();
        assert_eq!(model.id, "M1");
        assert_eq!(dataset.unwrap().id, "D1");
    }

    #[test]
    fn test_unknown_model() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(tmp.path());
        match catalog.load_model("nope") {
            Err(SabathError::UnknownEntity { kind, id, .. }) => {
                assert_eq!(kind, EntityKind::Model);
                assert_eq!(id, "nope");
            }
            other => panic!("expected UnknownEntity, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_listed_dataset_is_unknown_entity() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "models",
            "M1",
            json!({"id": "M1", "run": "true", "datasets": ["D9"]}),
        );
        let catalog = Catalog::new(tmp.path());
        assert!(matches!(
            catalog.load_run_inputs("M1"),
            Err(SabathError::UnknownEntity {
                kind: EntityKind::Dataset,
                ..
            })
        ));
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "models", "b", json!({"id": "b", "run": "true"}));
        write(tmp.path(), "models", "a", json!({"id": "a", "run": "true"}));
        std::fs::write(tmp.path().join("db/models/README.md"), "x").unwrap();

        let catalog = Catalog::new(tmp.path());
        assert_eq!(catalog.list(EntityKind::Model).unwrap(), vec!["a", "b"]);
        assert!(catalog.list(EntityKind::Dataset).unwrap().is_empty());
    }

    #[test]
    fn test_path_traversal_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(tmp.path());
        assert!(matches!(
            catalog.load_model("../secret"),
            Err(SabathError::MalformedDescriptor(_))
        ));
    }
}
