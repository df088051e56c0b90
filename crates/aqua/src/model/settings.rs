//! 🗄️ Backup & retention settings: small value objects with strong opinions about enums.
//!
//! Locally they speak snake_case (`to_dict`, `to_json`, `to_yaml`); the service
//! speaks camelCase. Deserialization accepts both, `to_remote` emits camelCase.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{AquaError, AquaResult};

/// 📣 Who gets an email when the robots archive your model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerNotificationType {
    #[default]
    None,
    All,
    OnFailure,
    OnSuccess,
}

impl CustomerNotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerNotificationType::None => "NONE",
            CustomerNotificationType::All => "ALL",
            CustomerNotificationType::OnFailure => "ON_FAILURE",
            CustomerNotificationType::OnSuccess => "ON_SUCCESS",
        }
    }
}

impl fmt::Display for CustomerNotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ⏳ Status of a backup/archive/delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingStatus {
    Pending,
    Succeeded,
    Failed,
}

impl SettingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingStatus::Pending => "PENDING",
            SettingStatus::Succeeded => "SUCCEEDED",
            SettingStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SettingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_timestamp(field: &str, value: &Option<String>) -> AquaResult<()> {
    match value {
        Some(ts) if chrono::DateTime::parse_from_rfc3339(ts).is_err() => Err(AquaError::Validation(
            format!("`{field}` must be an RFC 3339 timestamp, got `{ts}`"),
        )),
        _ => Ok(()),
    }
}

/// 💾 Cross-region backup switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelBackupSetting {
    #[serde(default, alias = "isBackupEnabled")]
    pub is_backup_enabled: bool,
    #[serde(default, alias = "backupRegion")]
    pub backup_region: Option<String>,
    #[serde(default, alias = "customerNotificationType")]
    pub customer_notification_type: CustomerNotificationType,
}

impl ModelBackupSetting {
    pub fn to_dict(&self) -> Value {
        json!({
            "is_backup_enabled": self.is_backup_enabled,
            "backup_region": self.backup_region,
            "customer_notification_type": self.customer_notification_type,
        })
    }

    pub fn from_dict(data: &Value) -> AquaResult<Self> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn to_json(&self) -> AquaResult<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    pub fn from_json(json_str: &str) -> AquaResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(&self.to_dict())?)
    }

    pub fn to_remote(&self) -> Value {
        json!({
            "isBackupEnabled": self.is_backup_enabled,
            "backupRegion": self.backup_region,
            "customerNotificationType": self.customer_notification_type,
        })
    }

    pub fn validate(&self) -> AquaResult<()> {
        if matches!(self.backup_region.as_deref(), Some(r) if r.trim().is_empty()) {
            return Err(AquaError::Validation(
                "`backup_region` must not be blank".to_string(),
            ));
        }
        if self.is_backup_enabled && self.backup_region.is_none() {
            return Err(AquaError::Validation(
                "`backup_region` is required when backups are enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// 🗓️ When to archive, when to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRetentionSetting {
    #[serde(default, alias = "archiveAfterDays")]
    pub archive_after_days: Option<i64>,
    #[serde(default, alias = "deleteAfterDays")]
    pub delete_after_days: Option<i64>,
    #[serde(default, alias = "customerNotificationType")]
    pub customer_notification_type: CustomerNotificationType,
}

impl ModelRetentionSetting {
    pub fn to_dict(&self) -> Value {
        json!({
            "archive_after_days": self.archive_after_days,
            "delete_after_days": self.delete_after_days,
            "customer_notification_type": self.customer_notification_type,
        })
    }

    pub fn from_dict(data: &Value) -> AquaResult<Self> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn to_json(&self) -> AquaResult<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    pub fn from_json(json_str: &str) -> AquaResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(&self.to_dict())?)
    }

    pub fn to_remote(&self) -> Value {
        json!({
            "archiveAfterDays": self.archive_after_days,
            "deleteAfterDays": self.delete_after_days,
            "customerNotificationType": self.customer_notification_type,
        })
    }

    pub fn validate(&self) -> AquaResult<()> {
        for (field, days) in [
            ("archive_after_days", self.archive_after_days),
            ("delete_after_days", self.delete_after_days),
        ] {
            if matches!(days, Some(d) if d < 0) {
                return Err(AquaError::Validation(format!(
                    "`{field}` must be a non-negative number of days"
                )));
            }
        }
        Ok(())
    }
}

/// 📜 What the service says happened to archive/delete. Read-only in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRetentionOperationDetails {
    #[serde(default, alias = "archiveState")]
    pub archive_state: Option<SettingStatus>,
    #[serde(default, alias = "archiveStateDetails")]
    pub archive_state_details: Option<String>,
    #[serde(default, alias = "deleteState")]
    pub delete_state: Option<SettingStatus>,
    #[serde(default, alias = "deleteStateDetails")]
    pub delete_state_details: Option<String>,
    #[serde(default, alias = "timeArchivalScheduled")]
    pub time_archival_scheduled: Option<String>,
    #[serde(default, alias = "timeDeletionScheduled")]
    pub time_deletion_scheduled: Option<String>,
}

impl ModelRetentionOperationDetails {
    pub fn to_dict(&self) -> Value {
        json!({
            "archive_state": self.archive_state,
            "archive_state_details": self.archive_state_details,
            "delete_state": self.delete_state,
            "delete_state_details": self.delete_state_details,
            "time_archival_scheduled": self.time_archival_scheduled,
            "time_deletion_scheduled": self.time_deletion_scheduled,
        })
    }

    pub fn from_dict(data: &Value) -> AquaResult<Self> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn to_json(&self) -> AquaResult<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    pub fn from_json(json_str: &str) -> AquaResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(&self.to_dict())?)
    }

    pub fn validate(&self) -> AquaResult<()> {
        validate_timestamp("time_archival_scheduled", &self.time_archival_scheduled)?;
        validate_timestamp("time_deletion_scheduled", &self.time_deletion_scheduled)
    }
}

/// 📜 Last backup outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelBackupOperationDetails {
    #[serde(default, alias = "backupState")]
    pub backup_state: Option<SettingStatus>,
    #[serde(default, alias = "backupStateDetails")]
    pub backup_state_details: Option<String>,
    #[serde(default, alias = "timeLastBackup")]
    pub time_last_backup: Option<String>,
}

impl ModelBackupOperationDetails {
    pub fn to_dict(&self) -> Value {
        json!({
            "backup_state": self.backup_state,
            "backup_state_details": self.backup_state_details,
            "time_last_backup": self.time_last_backup,
        })
    }

    pub fn from_dict(data: &Value) -> AquaResult<Self> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn to_json(&self) -> AquaResult<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    pub fn from_json(json_str: &str) -> AquaResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(&self.to_dict())?)
    }

    pub fn validate(&self) -> AquaResult<()> {
        validate_timestamp("time_last_backup", &self.time_last_backup)
    }
}
