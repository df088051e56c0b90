//! 🔄 Local ⇄ remote model translation.
//!
//! One static table ([`FIELD_MAP`]) says which local field lands in which
//! remote payload key, what converter it needs, and when it may be sent.
//! Both directions walk the same table so a field can't be half-mapped.
//!
//! Nested fields that refuse to convert go through the configured
//! [`ConversionPolicy`]: blow up, or shrug loudly and leave the field unset.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use super::datascience_model::DataScienceModel;
use super::metadata::MetadataList;
use super::settings::{
    ModelBackupOperationDetails, ModelBackupSetting, ModelRetentionOperationDetails,
    ModelRetentionSetting,
};
use crate::app_config::ConversionPolicy;
use crate::error::{AquaError, AquaResult};
use crate::oci::data_science::OciModelResource;

/// 🧰 Which converter a field goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    FreeformTags,
    DefinedTags,
    /// 📐 JSON document locally, JSON-encoded string remotely.
    Schema,
    CustomMetadata,
    DefinedMetadata,
    Integer,
    BackupSetting,
    RetentionSetting,
    BackupOperationDetails,
    RetentionOperationDetails,
}

/// 🚦 When a field is allowed into an outgoing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// 👀 Service-owned; read back, never sent.
    ReadOnly,
    /// 🐣 Only on create.
    CreateOnly,
    /// ✏️ On create and update.
    Mutable,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub local: &'static str,
    pub remote: &'static str,
    pub kind: FieldKind,
    pub access: Access,
}

const fn field(local: &'static str, remote: &'static str, kind: FieldKind, access: Access) -> FieldMapping {
    FieldMapping {
        local,
        remote,
        kind,
        access,
    }
}

/// 🗺️ local name → remote name, converter, access.
pub static FIELD_MAP: &[FieldMapping] = &[
    field("id", "id", FieldKind::Text, Access::ReadOnly),
    field("compartment_id", "compartmentId", FieldKind::Text, Access::CreateOnly),
    field("project_id", "projectId", FieldKind::Text, Access::CreateOnly),
    field("display_name", "displayName", FieldKind::Text, Access::Mutable),
    field("description", "description", FieldKind::Text, Access::Mutable),
    field("freeform_tags", "freeformTags", FieldKind::FreeformTags, Access::Mutable),
    field("defined_tags", "definedTags", FieldKind::DefinedTags, Access::Mutable),
    field("input_schema", "inputSchema", FieldKind::Schema, Access::CreateOnly),
    field("output_schema", "outputSchema", FieldKind::Schema, Access::CreateOnly),
    field("custom_metadata_list", "customMetadataList", FieldKind::CustomMetadata, Access::Mutable),
    field("defined_metadata_list", "definedMetadataList", FieldKind::DefinedMetadata, Access::Mutable),
    field("model_version_set_id", "modelVersionSetId", FieldKind::Text, Access::Mutable),
    field("model_version_set_name", "modelVersionSetName", FieldKind::Text, Access::ReadOnly),
    field("version_label", "versionLabel", FieldKind::Text, Access::Mutable),
    field("version_id", "versionId", FieldKind::Integer, Access::ReadOnly),
    field("time_created", "timeCreated", FieldKind::Text, Access::ReadOnly),
    field("lifecycle_state", "lifecycleState", FieldKind::Text, Access::ReadOnly),
    field("lifecycle_details", "lifecycleDetails", FieldKind::Text, Access::ReadOnly),
    field("backup_setting", "backupSetting", FieldKind::BackupSetting, Access::Mutable),
    field("retention_setting", "retentionSetting", FieldKind::RetentionSetting, Access::Mutable),
    field("backup_operation_details", "backupOperationDetails", FieldKind::BackupOperationDetails, Access::ReadOnly),
    field("retention_operation_details", "retentionOperationDetails", FieldKind::RetentionOperationDetails, Access::ReadOnly),
];

/// 🔍 Remote payload key for a local field name.
pub fn remote_name(local: &str) -> Option<&'static str> {
    FIELD_MAP.iter().find(|m| m.local == local).map(|m| m.remote)
}

/// 📤 Payload for `POST /models`.
pub fn to_create_payload(model: &DataScienceModel) -> AquaResult<OciModelResource> {
    to_payload(model, |access| access != Access::ReadOnly)
}

/// 📤 Payload for `PUT /models/{id}`. The version set link is never re-sent on update.
pub fn to_update_payload(model: &DataScienceModel) -> AquaResult<OciModelResource> {
    let mut payload = to_payload(model, |access| access == Access::Mutable)?;
    payload.model_version_set_id = None;
    Ok(payload)
}

fn to_payload(model: &DataScienceModel, include: impl Fn(Access) -> bool) -> AquaResult<OciModelResource> {
    let mut the_body = Map::new();
    for mapping in FIELD_MAP.iter().filter(|m| include(m.access)) {
        if let Some(value) = local_value(model, mapping)? {
            the_body.insert(mapping.remote.to_string(), value);
        }
    }
    Ok(serde_json::from_value(Value::Object(the_body))?)
}

fn local_value(model: &DataScienceModel, mapping: &FieldMapping) -> AquaResult<Option<Value>> {
    let value = match mapping.kind {
        FieldKind::Text => model
            .string_slot(mapping.local)
            .and_then(|slot| slot.clone())
            .map(Value::String),
        FieldKind::FreeformTags => model.freeform_tags().map(serde_json::to_value).transpose()?,
        FieldKind::DefinedTags => model.defined_tags().map(serde_json::to_value).transpose()?,
        FieldKind::Schema => {
            let schema = match mapping.local {
                "input_schema" => model.input_schema(),
                _ => model.output_schema(),
            };
            match schema {
                Some(Value::String(raw)) => Some(Value::String(raw.clone())),
                Some(Value::Null) | None => None,
                Some(other) => Some(Value::String(serde_json::to_string(other)?)),
            }
        }
        FieldKind::CustomMetadata => metadata_value(model.custom_metadata_list())?,
        FieldKind::DefinedMetadata => metadata_value(model.defined_metadata_list())?,
        FieldKind::Integer => model.version_id().map(Value::from),
        FieldKind::BackupSetting => model.backup_setting().map(ModelBackupSetting::to_remote),
        FieldKind::RetentionSetting => model.retention_setting().map(ModelRetentionSetting::to_remote),
        // 👀 read-only kinds never leave the building
        FieldKind::BackupOperationDetails | FieldKind::RetentionOperationDetails => None,
    };
    Ok(value)
}

fn metadata_value(list: &MetadataList) -> AquaResult<Option<Value>> {
    if list.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_value(list)?))
}

/// 📥 Overwrite the model's remote-owned fields with what the service returned.
///
/// Provenance, artifact and the by-reference manifest are not part of the
/// model resource and are left alone.
pub fn apply_resource(
    model: &mut DataScienceModel,
    resource: &OciModelResource,
    policy: ConversionPolicy,
) -> AquaResult<()> {
    let Value::Object(remote) = serde_json::to_value(resource)? else {
        return Err(AquaError::Conversion {
            field: "model".to_string(),
            reason: "the model resource did not serialize to an object".to_string(),
        });
    };

    for mapping in FIELD_MAP {
        let raw = remote.get(mapping.remote).filter(|v| !v.is_null());
        match mapping.kind {
            FieldKind::Text => {
                let text = raw.and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                });
                if let Some(slot) = model.string_slot_mut(mapping.local) {
                    *slot = text;
                }
            }
            FieldKind::FreeformTags => model.set_freeform_tags(convert(mapping, raw, policy)?),
            FieldKind::DefinedTags => model.set_defined_tags(convert(mapping, raw, policy)?),
            FieldKind::Schema => {
                let schema = convert_schema(mapping, raw, policy)?;
                match mapping.local {
                    "input_schema" => model.set_input_schema(schema),
                    _ => model.set_output_schema(schema),
                }
            }
            FieldKind::CustomMetadata => model.set_custom_metadata_list(
                convert::<MetadataList>(mapping, raw, policy)?.unwrap_or_default(),
            ),
            FieldKind::DefinedMetadata => model.set_defined_metadata_list(
                convert::<MetadataList>(mapping, raw, policy)?.unwrap_or_default(),
            ),
            FieldKind::Integer => model.set_version_id(convert(mapping, raw, policy)?),
            FieldKind::BackupSetting => {
                model.set_backup_setting(convert::<ModelBackupSetting>(mapping, raw, policy)?)
            }
            FieldKind::RetentionSetting => {
                model.set_retention_setting(convert::<ModelRetentionSetting>(mapping, raw, policy)?)
            }
            FieldKind::BackupOperationDetails => model.set_backup_operation_details(
                convert::<ModelBackupOperationDetails>(mapping, raw, policy)?,
            ),
            FieldKind::RetentionOperationDetails => model.set_retention_operation_details(
                convert::<ModelRetentionOperationDetails>(mapping, raw, policy)?,
            ),
        }
    }
    Ok(())
}

/// 📥 Fresh local model from a remote resource.
pub fn from_resource(resource: &OciModelResource, policy: ConversionPolicy) -> AquaResult<DataScienceModel> {
    let mut model = DataScienceModel::new();
    apply_resource(&mut model, resource, policy)?;
    Ok(model)
}

fn convert<T: DeserializeOwned>(
    mapping: &FieldMapping,
    raw: Option<&Value>,
    policy: ConversionPolicy,
) -> AquaResult<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(value) => Ok(Some(value)),
        Err(e) => conversion_failed(mapping, e.to_string(), policy),
    }
}

fn convert_schema(
    mapping: &FieldMapping,
    raw: Option<&Value>,
    policy: ConversionPolicy,
) -> AquaResult<Option<Value>> {
    match raw {
        None => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => conversion_failed(mapping, e.to_string(), policy),
        },
        Some(other) => Ok(Some(other.clone())),
    }
}

fn conversion_failed<T>(mapping: &FieldMapping, reason: String, policy: ConversionPolicy) -> AquaResult<Option<T>> {
    match policy {
        ConversionPolicy::Propagate => Err(AquaError::Conversion {
            field: mapping.remote.to_string(),
            reason,
        }),
        ConversionPolicy::LogAndContinue => {
            warn!(
                "⚠️ could not convert `{}` from the service response, leaving it unset: {}",
                mapping.remote, reason
            );
            Ok(None)
        }
    }
}
