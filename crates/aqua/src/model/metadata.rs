//! 🏷️ Model metadata: custom, defined (taxonomy), and provenance.

use serde::{Deserialize, Serialize};

use crate::oci::data_science::OciModelProvenance;

/// 🗂️ Custom metadata categories the catalog recognises.
pub mod category {
    pub const PERFORMANCE: &str = "Performance";
    pub const TRAINING_PROFILE: &str = "Training Profile";
    pub const TRAINING_AND_VALIDATION_DATASETS: &str = "Training and Validation Datasets";
    pub const TRAINING_ENVIRONMENT: &str = "Training Environment";
    pub const OTHER: &str = "Other";
}

/// 🏷️ One key/value pair on a model. Values are always strings remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 📎 Set by the service when a metadata artifact blob is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_artifact: Option<bool>,
}

impl MetadataItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// 📚 An ordered list of metadata items with at most one item per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataList(Vec<MetadataItem>);

impl MetadataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataItem> {
        self.0.iter().find(|item| item.key == key)
    }

    /// ➕ Insert or replace by key. Position is kept on replace.
    pub fn upsert(&mut self, item: MetadataItem) {
        match self.0.iter_mut().find(|existing| existing.key == item.key) {
            Some(existing) => *existing = item,
            None => self.0.push(item),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<MetadataItem> {
        let idx = self.0.iter().position(|item| item.key == key)?;
        Some(self.0.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetadataItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<MetadataItem> for MetadataList {
    fn from_iter<T: IntoIterator<Item = MetadataItem>>(iter: T) -> Self {
        let mut list = MetadataList::new();
        for item in iter {
            list.upsert(item);
        }
        list
    }
}

/// 🧬 Where the model came from. Local spelling of the remote provenance resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProvenanceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_script_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_id: Option<String>,
}

impl ModelProvenanceMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&ModelProvenanceMetadata> for OciModelProvenance {
    fn from(local: &ModelProvenanceMetadata) -> Self {
        OciModelProvenance {
            repository_url: local.repository_url.clone(),
            git_branch: local.git_branch.clone(),
            git_commit: local.git_commit.clone(),
            script_dir: local.script_dir.clone(),
            training_script: local.training_script_path.clone(),
            training_id: local.training_id.clone(),
        }
    }
}

impl From<OciModelProvenance> for ModelProvenanceMetadata {
    fn from(remote: OciModelProvenance) -> Self {
        ModelProvenanceMetadata {
            repository_url: remote.repository_url,
            git_branch: remote.git_branch,
            git_commit: remote.git_commit,
            script_dir: remote.script_dir,
            training_script_path: remote.training_script,
            training_id: remote.training_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_upsert_keeps_one_item_per_key() {
        let mut list = MetadataList::new();
        list.upsert(MetadataItem::new("framework", "pytorch"));
        list.upsert(MetadataItem::new("modelDescription", "false"));
        list.upsert(MetadataItem::new("modelDescription", "true").with_category(category::OTHER));

        assert_eq!(list.len(), 2);
        let the_flag = list.get("modelDescription").unwrap();
        assert_eq!(the_flag.value, "true");
        assert_eq!(the_flag.category.as_deref(), Some("Other"));
        assert_eq!(list.iter().next().unwrap().key, "framework");
    }

    #[test]
    fn the_one_where_provenance_renames_the_training_script() {
        let local = ModelProvenanceMetadata {
            training_script_path: Some("train.py".into()),
            git_branch: Some("main".into()),
            ..Default::default()
        };
        let remote = OciModelProvenance::from(&local);
        assert_eq!(remote.training_script.as_deref(), Some("train.py"));
        assert_eq!(ModelProvenanceMetadata::from(remote), local);
        assert!(ModelProvenanceMetadata::default().is_empty());
    }
}
