//! 📦 `DataScienceModel`: the local view of one catalog entry.
//!
//! Plain fields, explicit accessors, chained `with_*` setters, and a
//! [`DataScienceModel::validate`] you call before shipping it anywhere. The
//! struct never talks to the network; [`crate::model::catalog::ModelCatalog`]
//! does that and writes the results back in here.
//!
//! 🧠 Local objects are disposable. The catalog is the source of truth, `sync`
//! is how you find out what it thinks.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::by_reference::{
    ArtifactReference, MODEL_BY_REFERENCE_DESC, ModelFileDescription, remove_artifact,
};
use super::metadata::{MetadataItem, MetadataList, ModelProvenanceMetadata, category};
use super::settings::{
    ModelBackupOperationDetails, ModelBackupSetting, ModelRetentionOperationDetails,
    ModelRetentionSetting,
};
use crate::error::{AquaError, AquaResult};
use crate::object_storage_uri::ObjectStorageUri;

pub const MODEL_KIND: &str = "datascienceModel";
pub const MODEL_TYPE: &str = "dataScienceModel";
const DISPLAY_NAME_PREFIX: &str = "datascience_model";

/// 📍 Where the artifact lives. Lists are for by-reference models only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactLocation {
    Single(String),
    Multiple(Vec<String>),
}

impl ArtifactLocation {
    pub fn as_list(&self) -> Vec<String> {
        match self {
            ArtifactLocation::Single(one) => vec![one.clone()],
            ArtifactLocation::Multiple(many) => many.clone(),
        }
    }

    /// 🪣 The single location, when it is an `oci://` path.
    pub fn as_oci_path(&self) -> Option<&str> {
        match self {
            ArtifactLocation::Single(one) if ObjectStorageUri::is_oci_path(one) => Some(one),
            _ => None,
        }
    }

    /// 📁 The single location, when it is a local path.
    pub fn as_local_path(&self) -> Option<&Path> {
        match self {
            ArtifactLocation::Single(one) if !ObjectStorageUri::is_oci_path(one) => {
                Some(Path::new(one))
            }
            _ => None,
        }
    }
}

impl From<&str> for ArtifactLocation {
    fn from(value: &str) -> Self {
        ArtifactLocation::Single(value.to_string())
    }
}

impl From<String> for ArtifactLocation {
    fn from(value: String) -> Self {
        ArtifactLocation::Single(value)
    }
}

impl From<Vec<String>> for ArtifactLocation {
    fn from(value: Vec<String>) -> Self {
        match value.len() {
            1 => ArtifactLocation::Single(value.into_iter().next().unwrap_or_default()),
            _ => ArtifactLocation::Multiple(value),
        }
    }
}

pub type FreeformTags = BTreeMap<String, String>;
pub type DefinedTags = BTreeMap<String, BTreeMap<String, Value>>;

/// 📦 One model, as this process currently believes it to be.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataScienceModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compartment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    freeform_tags: Option<FreeformTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    defined_tags: Option<DefinedTags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "MetadataList::is_empty")]
    custom_metadata_list: MetadataList,
    #[serde(default, skip_serializing_if = "MetadataList::is_empty")]
    defined_metadata_list: MetadataList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provenance_metadata: Option<ModelProvenanceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artifact: Option<ArtifactLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version_set_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lifecycle_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lifecycle_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_file_description: Option<ModelFileDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_setting: Option<ModelBackupSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retention_setting: Option<ModelRetentionSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_operation_details: Option<ModelBackupOperationDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retention_operation_details: Option<ModelRetentionOperationDetails>,
}

// 🏭 string fields all look the same: a borrowing getter and a chaining setter
macro_rules! string_field {
    ($($field:ident, $with:ident;)+) => {
        $(
            pub fn $field(&self) -> Option<&str> {
                self.$field.as_deref()
            }

            pub fn $with(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )+
    };
}

impl DataScienceModel {
    pub fn new() -> Self {
        Self::default()
    }

    string_field! {
        id, with_id;
        compartment_id, with_compartment_id;
        project_id, with_project_id;
        display_name, with_display_name;
        description, with_description;
        model_version_set_id, with_model_version_set_id;
        model_version_set_name, with_model_version_set_name;
        version_label, with_version_label;
        time_created, with_time_created;
        lifecycle_state, with_lifecycle_state;
        lifecycle_details, with_lifecycle_details;
    }

    pub fn freeform_tags(&self) -> Option<&FreeformTags> {
        self.freeform_tags.as_ref()
    }

    pub fn with_freeform_tags(mut self, tags: FreeformTags) -> Self {
        self.freeform_tags = Some(tags);
        self
    }

    pub fn defined_tags(&self) -> Option<&DefinedTags> {
        self.defined_tags.as_ref()
    }

    pub fn with_defined_tags(mut self, tags: DefinedTags) -> Self {
        self.defined_tags = Some(tags);
        self
    }

    pub fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn custom_metadata_list(&self) -> &MetadataList {
        &self.custom_metadata_list
    }

    pub fn custom_metadata_list_mut(&mut self) -> &mut MetadataList {
        &mut self.custom_metadata_list
    }

    pub fn with_custom_metadata_list(mut self, list: MetadataList) -> Self {
        self.custom_metadata_list = list;
        self
    }

    pub fn defined_metadata_list(&self) -> &MetadataList {
        &self.defined_metadata_list
    }

    pub fn defined_metadata_list_mut(&mut self) -> &mut MetadataList {
        &mut self.defined_metadata_list
    }

    pub fn with_defined_metadata_list(mut self, list: MetadataList) -> Self {
        self.defined_metadata_list = list;
        self
    }

    pub fn provenance_metadata(&self) -> Option<&ModelProvenanceMetadata> {
        self.provenance_metadata.as_ref()
    }

    pub fn with_provenance_metadata(mut self, provenance: ModelProvenanceMetadata) -> Self {
        self.provenance_metadata = Some(provenance);
        self
    }

    pub fn artifact(&self) -> Option<&ArtifactLocation> {
        self.artifact.as_ref()
    }

    pub fn with_artifact(mut self, artifact: impl Into<ArtifactLocation>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    pub fn version_id(&self) -> Option<i64> {
        self.version_id
    }

    pub fn with_version_id(mut self, version_id: i64) -> Self {
        self.version_id = Some(version_id);
        self
    }

    pub fn model_file_description(&self) -> Option<&ModelFileDescription> {
        self.model_file_description.as_ref()
    }

    pub fn with_model_file_description(mut self, description: ModelFileDescription) -> Self {
        self.model_file_description = Some(description);
        self
    }

    pub fn backup_setting(&self) -> Option<&ModelBackupSetting> {
        self.backup_setting.as_ref()
    }

    pub fn with_backup_setting(mut self, setting: ModelBackupSetting) -> Self {
        self.backup_setting = Some(setting);
        self
    }

    pub fn retention_setting(&self) -> Option<&ModelRetentionSetting> {
        self.retention_setting.as_ref()
    }

    pub fn with_retention_setting(mut self, setting: ModelRetentionSetting) -> Self {
        self.retention_setting = Some(setting);
        self
    }

    pub fn backup_operation_details(&self) -> Option<&ModelBackupOperationDetails> {
        self.backup_operation_details.as_ref()
    }

    pub fn retention_operation_details(&self) -> Option<&ModelRetentionOperationDetails> {
        self.retention_operation_details.as_ref()
    }

    // ===== 🔧 crate-internal mutation, used by sync and the remote converters =====

    pub(crate) fn set_display_name(&mut self, name: Option<String>) {
        self.display_name = name;
    }

    pub(crate) fn set_artifact(&mut self, artifact: Option<ArtifactLocation>) {
        self.artifact = artifact;
    }

    pub(crate) fn set_model_file_description(&mut self, description: Option<ModelFileDescription>) {
        self.model_file_description = description;
    }

    pub(crate) fn model_file_description_mut(&mut self) -> &mut ModelFileDescription {
        self.model_file_description.get_or_insert_with(ModelFileDescription::default)
    }

    // ===== 🧠 derived facts =====

    /// 🔗 Flagged by custom metadata `modelDescription = "true"` (any case).
    pub fn is_model_created_by_reference(&self) -> bool {
        self.custom_metadata_list
            .get(MODEL_BY_REFERENCE_DESC)
            .is_some_and(|item| item.value.trim().eq_ignore_ascii_case("true"))
    }

    /// 🏷️ Set the by-reference flag. Replaces an existing flag item.
    pub fn mark_created_by_reference(&mut self) {
        self.custom_metadata_list.upsert(
            MetadataItem::new(MODEL_BY_REFERENCE_DESC, "true")
                .with_description("model by reference flag")
                .with_category(category::OTHER),
        );
    }

    /// ➖ Drop a location from the by-reference manifest.
    pub fn remove_artifact(&mut self, reference: &ArtifactReference) -> AquaResult<bool> {
        match self.model_file_description.as_mut() {
            Some(description) => remove_artifact(description, reference),
            None => Ok(false),
        }
    }

    /// 💾 The id, or a `ModelNotSaved` explaining what you forgot.
    pub fn require_id(&self, action: &str) -> AquaResult<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AquaError::ModelNotSaved(format!(
                    "Model needs to be saved to the model catalog before {action}."
                ))
            })
    }

    /// 📐 Local checks, no network. Call before create/update.
    pub fn validate(&self) -> AquaResult<()> {
        if matches!(self.display_name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(AquaError::Validation(
                "`display_name` must not be blank".to_string(),
            ));
        }
        if let Some(ArtifactLocation::Multiple(many)) = &self.artifact {
            if many.is_empty() {
                return Err(AquaError::Validation(
                    "`artifact` must contain at least one location".to_string(),
                ));
            }
        }
        for (field, schema) in [
            ("input_schema", &self.input_schema),
            ("output_schema", &self.output_schema),
        ] {
            if let Some(Value::String(raw)) = schema {
                serde_json::from_str::<Value>(raw).map_err(|e| {
                    AquaError::Validation(format!("`{field}` is not valid JSON: {e}"))
                })?;
            }
        }
        if let Some(setting) = &self.backup_setting {
            setting.validate()?;
        }
        if let Some(setting) = &self.retention_setting {
            setting.validate()?;
        }
        if let Some(description) = &self.model_file_description {
            description.validate()?;
        }
        Ok(())
    }

    /// 🎲 `datascience_model-<adjective>-<animal>-<timestamp>`.
    pub fn random_display_name() -> String {
        const ADJECTIVES: &[&str] = &[
            "amber", "brisk", "cosmic", "dapper", "eager", "fuzzy", "gentle", "hasty",
            "icy", "jolly", "keen", "lucid", "mellow", "nimble", "plucky", "quiet",
        ];
        const ANIMALS: &[&str] = &[
            "alpaca", "badger", "capybara", "dolphin", "egret", "ferret", "gecko", "heron",
            "ibis", "jackal", "koala", "lemur", "marmot", "narwhal", "otter", "puffin",
        ];
        let the_dice = uuid::Uuid::new_v4();
        let bytes = the_dice.as_bytes();
        let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
        let animal = ANIMALS[bytes[1] as usize % ANIMALS.len()];
        let stamp = chrono::Utc::now().format("%Y-%m-%d-%H:%M.%S");
        format!("{DISPLAY_NAME_PREFIX}-{adjective}-{animal}-{stamp}")
    }

    // ===== 🔄 dict / yaml =====

    /// 📤 `{kind, type, spec}` with camelCase spec keys.
    pub fn to_dict(&self) -> AquaResult<Value> {
        Ok(json!({
            "kind": MODEL_KIND,
            "type": MODEL_TYPE,
            "spec": serde_json::to_value(self)?,
        }))
    }

    /// 📥 Accepts the full envelope or a bare spec.
    pub fn from_dict(data: &Value) -> AquaResult<Self> {
        if let Some(kind) = data.get("kind").and_then(Value::as_str) {
            if kind != MODEL_KIND {
                return Err(AquaError::Validation(format!(
                    "Expected kind `{MODEL_KIND}`, got `{kind}`"
                )));
            }
        }
        let the_spec = data.get("spec").unwrap_or(data);
        Ok(serde_json::from_value(the_spec.clone())?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(&self.to_dict()?)?)
    }

    pub fn from_yaml(yaml: &str) -> AquaResult<Self> {
        let the_value: Value = serde_yaml::from_str(yaml)?;
        Self::from_dict(&the_value)
    }
}

impl DataScienceModel {
    /// ✏️ The plain string slot behind a local field name, for table-driven conversion.
    pub(crate) fn string_slot_mut(&mut self, local: &str) -> Option<&mut Option<String>> {
        Some(match local {
            "id" => &mut self.id,
            "compartment_id" => &mut self.compartment_id,
            "project_id" => &mut self.project_id,
            "display_name" => &mut self.display_name,
            "description" => &mut self.description,
            "model_version_set_id" => &mut self.model_version_set_id,
            "model_version_set_name" => &mut self.model_version_set_name,
            "version_label" => &mut self.version_label,
            "time_created" => &mut self.time_created,
            "lifecycle_state" => &mut self.lifecycle_state,
            "lifecycle_details" => &mut self.lifecycle_details,
            _ => return None,
        })
    }

    pub(crate) fn string_slot(&self, local: &str) -> Option<&Option<String>> {
        Some(match local {
            "id" => &self.id,
            "compartment_id" => &self.compartment_id,
            "project_id" => &self.project_id,
            "display_name" => &self.display_name,
            "description" => &self.description,
            "model_version_set_id" => &self.model_version_set_id,
            "model_version_set_name" => &self.model_version_set_name,
            "version_label" => &self.version_label,
            "time_created" => &self.time_created,
            "lifecycle_state" => &self.lifecycle_state,
            "lifecycle_details" => &self.lifecycle_details,
            _ => return None,
        })
    }

    pub(crate) fn set_freeform_tags(&mut self, tags: Option<FreeformTags>) {
        self.freeform_tags = tags;
    }

    pub(crate) fn set_defined_tags(&mut self, tags: Option<DefinedTags>) {
        self.defined_tags = tags;
    }

    pub(crate) fn set_input_schema(&mut self, schema: Option<Value>) {
        self.input_schema = schema;
    }

    pub(crate) fn set_output_schema(&mut self, schema: Option<Value>) {
        self.output_schema = schema;
    }

    pub(crate) fn set_custom_metadata_list(&mut self, list: MetadataList) {
        self.custom_metadata_list = list;
    }

    pub(crate) fn set_defined_metadata_list(&mut self, list: MetadataList) {
        self.defined_metadata_list = list;
    }

    pub(crate) fn set_provenance_metadata(&mut self, provenance: Option<ModelProvenanceMetadata>) {
        self.provenance_metadata = provenance;
    }

    pub(crate) fn set_version_id(&mut self, version_id: Option<i64>) {
        self.version_id = version_id;
    }

    pub(crate) fn set_backup_setting(&mut self, setting: Option<ModelBackupSetting>) {
        self.backup_setting = setting;
    }

    pub(crate) fn set_retention_setting(&mut self, setting: Option<ModelRetentionSetting>) {
        self.retention_setting = setting;
    }

    pub(crate) fn set_backup_operation_details(
        &mut self,
        details: Option<ModelBackupOperationDetails>,
    ) {
        self.backup_operation_details = details;
    }

    pub(crate) fn set_retention_operation_details(
        &mut self,
        details: Option<ModelRetentionOperationDetails>,
    ) {
        self.retention_operation_details = details;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::settings::CustomerNotificationType;

    fn the_full_model() -> DataScienceModel {
        DataScienceModel::new()
            .with_id("ocid1.datasciencemodel..m1")
            .with_compartment_id("ocid1.compartment..c")
            .with_project_id("ocid1.datascienceproject..p")
            .with_display_name("llama-but-smaller")
            .with_description("a model, allegedly")
            .with_freeform_tags(FreeformTags::from([("team".to_string(), "aqua".to_string())]))
            .with_input_schema(json!({"schema": [{"name": "x"}]}))
            .with_model_version_set_id("ocid1.modelversionset..v")
            .with_version_label("v1")
            .with_version_id(7)
            .with_lifecycle_state("ACTIVE")
            .with_artifact("oci://bucket@ns/path/")
            .with_custom_metadata_list(MetadataList::from_iter([MetadataItem::new(
                "framework", "pytorch",
            )]))
            .with_retention_setting(ModelRetentionSetting {
                archive_after_days: Some(30),
                delete_after_days: None,
                customer_notification_type: CustomerNotificationType::All,
            })
    }

    #[test]
    fn the_one_where_to_dict_and_back_changes_nothing() {
        let model = the_full_model();
        let dict = model.to_dict().unwrap();
        assert_eq!(dict["kind"], MODEL_KIND);
        assert_eq!(dict["type"], MODEL_TYPE);
        assert_eq!(dict["spec"]["displayName"], "llama-but-smaller");
        assert_eq!(dict["spec"]["versionId"], 7);

        let back = DataScienceModel::from_dict(&dict).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.id(), model.id());
        assert_eq!(back.version_label(), Some("v1"));
    }

    #[test]
    fn the_one_where_yaml_survives_the_round_trip_too() {
        let model = the_full_model();
        let yaml = model.to_yaml().unwrap();
        assert!(yaml.contains("kind: datascienceModel"));
        assert_eq!(DataScienceModel::from_yaml(&yaml).unwrap(), model);
    }

    #[test]
    fn the_one_where_the_wrong_kind_is_turned_away() {
        let err = DataScienceModel::from_dict(&json!({"kind": "job", "spec": {}})).unwrap_err();
        assert!(matches!(err, AquaError::Validation(_)));
    }

    #[test]
    fn the_one_where_the_flag_decides_by_reference() {
        let mut model = DataScienceModel::new();
        assert!(!model.is_model_created_by_reference());
        model.custom_metadata_list_mut().upsert(MetadataItem::new("modelDescription", "TRUE"));
        assert!(model.is_model_created_by_reference());
        model.custom_metadata_list_mut().upsert(MetadataItem::new("modelDescription", "false"));
        assert!(!model.is_model_created_by_reference());
        model.mark_created_by_reference();
        assert!(model.is_model_created_by_reference());
        assert_eq!(model.custom_metadata_list().len(), 1);
    }

    #[test]
    fn the_one_where_random_names_wear_the_prefix() {
        let name = DataScienceModel::random_display_name();
        assert!(name.starts_with("datascience_model-"));
        assert!(name.split('-').count() >= 4);
    }

    #[test]
    fn the_one_where_validate_catches_bad_settings_and_blank_names() {
        assert!(the_full_model().validate().is_ok());
        let blank = DataScienceModel::new().with_display_name("  ");
        assert!(blank.validate().is_err());
        let negative = DataScienceModel::new().with_retention_setting(ModelRetentionSetting {
            delete_after_days: Some(-3),
            ..Default::default()
        });
        assert!(negative.validate().is_err());
    }

    #[test]
    fn the_one_where_an_unsaved_model_cannot_pretend() {
        let err = DataScienceModel::new().require_id("it can be restored").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Model needs to be saved to the model catalog before it can be restored."
        );
    }

    #[test]
    fn the_one_where_one_uri_in_a_list_is_just_a_uri() {
        let single: ArtifactLocation = vec!["oci://b@n/p".to_string()].into();
        assert_eq!(single.as_oci_path(), Some("oci://b@n/p"));
        let many: ArtifactLocation = vec!["oci://b@n/a".to_string(), "oci://b@n/b".to_string()].into();
        assert_eq!(many.as_list().len(), 2);
        assert!(ArtifactLocation::from("/tmp/model").as_local_path().is_some());
    }
}
