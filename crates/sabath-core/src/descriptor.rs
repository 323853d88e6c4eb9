//! Model and dataset descriptors loaded from JSON.
//!
//! Each descriptor keeps the exact JSON it was parsed from so a report can
//! persist it verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EntityKind, Result, SabathError};

/// One shell command or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Commands {
    One(String),
    Many(Vec<String>),
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Many(Vec::new())
    }
}

impl Commands {
    /// Iterate commands in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Commands::One(cmd) => std::slice::from_ref(cmd),
            Commands::Many(cmds) => cmds,
        };
        slice.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            Commands::One(_) => 1,
            Commands::Many(cmds) => cmds.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Commands {
    fn from(cmd: &str) -> Self {
        Commands::One(cmd.to_string())
    }
}

impl From<Vec<&str>> for Commands {
    fn from(cmds: Vec<&str>) -> Self {
        Commands::Many(cmds.into_iter().map(str::to_string).collect())
    }
}

/// A git repository to clone, with optional steps run inside the clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSource {
    pub url: String,
    #[serde(default)]
    pub steps: Option<Commands>,
}

/// How an entity's files are acquired (`clone` for models, `download` for datasets).
///
/// Kept as optional keys rather than a closed enum: a source with neither key
/// parses fine and is rejected by the fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub git: Option<GitSource>,
    #[serde(default)]
    pub shell: Option<Commands>,
}

/// A resolved acquisition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition<'a> {
    Git(&'a GitSource),
    Shell(&'a Commands),
}

impl Source {
    /// Resolve the acquisition kind; `git` takes precedence over `shell`.
    pub fn acquisition(&self) -> Option<Acquisition<'_>> {
        match (&self.git, &self.shell) {
            (Some(git), _) => Some(Acquisition::Git(git)),
            (None, Some(shell)) => Some(Acquisition::Shell(shell)),
            (None, None) => None,
        }
    }
}

/// Anything the fetcher can place into the cache.
pub trait Entity {
    /// Unique id, also the cache directory name.
    fn id(&self) -> &str;

    fn kind(&self) -> EntityKind;

    /// Acquisition source, if the descriptor declares one.
    fn source(&self) -> Option<&Source>;

    /// The descriptor exactly as loaded.
    fn raw(&self) -> &Value;

    /// Stage label logged when the entity is acquired.
    fn fetch_label(&self) -> &'static str {
        match self.kind() {
            EntityKind::Model => "CLONE",
            EntityKind::Dataset => "DOWNLOAD",
        }
    }
}

/// A runnable surrogate model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    #[serde(default)]
    pub clone: Option<Source>,
    #[serde(default)]
    pub setup: Commands,
    pub run: Commands,
    /// Only the first dataset is honored.
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(skip)]
    raw: Value,
}

impl ModelDescriptor {
    /// Parse a model descriptor, keeping the original JSON.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut model: ModelDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| SabathError::MalformedDescriptor(format!("model: {e}")))?;
        validate_id(&model.id)?;
        for ds in &model.datasets {
            validate_id(ds)?;
        }
        model.raw = value;
        Ok(model)
    }

    pub fn parse(json: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }

    /// Id of the dataset the model runs against.
    pub fn primary_dataset(&self) -> Option<&str> {
        self.datasets.first().map(String::as_str)
    }
}

impl Entity for ModelDescriptor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Model
    }

    fn source(&self) -> Option<&Source> {
        self.clone.as_ref()
    }

    fn raw(&self) -> &Value {
        &self.raw
    }
}

/// A collection of files a model consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub id: String,
    #[serde(default)]
    pub download: Option<Source>,
    #[serde(skip)]
    raw: Value,
}

impl DatasetDescriptor {
    /// Parse a dataset descriptor, keeping the original JSON.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut dataset: DatasetDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| SabathError::MalformedDescriptor(format!("dataset: {e}")))?;
        validate_id(&dataset.id)?;
        dataset.raw = value;
        Ok(dataset)
    }

    pub fn parse(json: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }
}

impl Entity for DatasetDescriptor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Dataset
    }

    fn source(&self) -> Option<&Source> {
        self.download.as_ref()
    }

    fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Ids name cache directories, so they must be a single path component.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
    {
        return Err(SabathError::MalformedDescriptor(format!(
            "invalid entity id '{id}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_parses_single_and_list_commands() {
        let model = ModelDescriptor::from_json(json!({
            "id": "M1",
            "clone": {"git": {"url": "https://example.com/m1.git"}},
            "setup": "make",
            "run": ["echo a", "echo b"],
            "datasets": ["D1", "D2"]
        }))
        .unwrap();

        assert_eq!(model.setup, Commands::One("make".to_string()));
        assert_eq!(model.run.iter().collect::<Vec<_>>(), vec!["echo a", "echo b"]);
        assert_eq!(model.primary_dataset(), Some("D1"));
        assert_eq!(model.fetch_label(), "CLONE");
        assert_eq!(model.raw()["setup"], json!("make"));
    }

    #[test]
    fn test_model_defaults_for_optional_keys() {
        let model = ModelDescriptor::from_json(json!({"id": "M2", "run": "true"})).unwrap();
        assert!(model.setup.is_empty());
        assert!(model.datasets.is_empty());
        assert!(model.source().is_none());
        assert!(model.primary_dataset().is_none());
    }

    #[test]
    fn test_model_without_run_is_malformed() {
        let err = ModelDescriptor::from_json(json!({"id": "M3"})).unwrap_err();
        assert!(matches!(err, SabathError::MalformedDescriptor(_)));
    }

    #[test]
    fn test_dataset_git_with_steps() {
        let ds = DatasetDescriptor::from_json(json!({
            "id": "D1",
            "download": {"git": {"url": "u", "steps": ["a", "b"]}}
        }))
        .unwrap();
        match ds.source().unwrap().acquisition() {
            Some(Acquisition::Git(git)) => {
                assert_eq!(git.url, "u");
                assert_eq!(git.steps.as_ref().unwrap().len(), 2);
            }
            other => panic!("expected git acquisition, got {other:?}"),
        }
        assert_eq!(ds.fetch_label(), "DOWNLOAD");
    }

    #[test]
    fn test_dataset_shell_download() {
        let ds = DatasetDescriptor::from_json(json!({
            "id": "D1",
            "download": {"shell": "mkdir -p data"}
        }))
        .unwrap();
        assert_eq!(
            ds.source().unwrap().acquisition(),
            Some(Acquisition::Shell(&Commands::One("mkdir -p data".to_string())))
        );
    }

    #[test]
    fn test_unknown_download_kind_parses_but_does_not_resolve() {
        let ds = DatasetDescriptor::from_json(json!({
            "id": "D1",
            "download": {"ftp": "ftp://example.com"}
        }))
        .unwrap();
        assert!(ds.source().unwrap().acquisition().is_none());
    }

    #[test]
    fn test_git_preferred_over_shell() {
        let source = Source {
            git: Some(GitSource {
                url: "u".to_string(),
                steps: None,
            }),
            shell: Some(Commands::from("echo")),
        };
        assert!(matches!(source.acquisition(), Some(Acquisition::Git(_))));
    }

    #[test]
    fn test_invalid_ids_rejected() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(validate_id(bad).is_err(), "id {bad:?} should be rejected");
        }
        assert!(validate_id("CloudMask-0").is_ok());

        let err = ModelDescriptor::from_json(json!({
            "id": "M1", "run": "true", "datasets": ["../escape"]
        }))
        .unwrap_err();
        assert!(matches!(err, SabathError::MalformedDescriptor(_)));
    }
}
