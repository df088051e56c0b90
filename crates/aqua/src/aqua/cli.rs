//! ⌨️ From a console form to a copy-pasteable `ads aqua ...` command.
//!
//! The console POSTs `{command, subcommand, payload}`; we look up which details
//! struct that pair means, validate the payload against it, and print the
//! command line that would do the same thing. We never run it.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AquaError, AquaResult};

/// 📨 What the console sends to `POST /aqua/cli`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CliDetails {
    pub command: String,
    pub subcommand: String,
    #[serde(default)]
    pub payload: Value,
}

impl CliDetails {
    /// 🔑 `model` + `register` → `model_register`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.command, self.subcommand)
    }

    /// 🧭 Dispatch on the registered commands. Unknown pairs are an argument error.
    pub fn build_cli(&self) -> AquaResult<String> {
        match self.key().as_str() {
            ImportModelDetails::KEY => ImportModelDetails::from_payload(self.payload.clone())?.build_cli(),
            other => Err(AquaError::InvalidArgument(format!(
                "The command `{other}` is not supported."
            ))),
        }
    }
}

/// 📥 Registering a model from Hugging Face or object storage.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ImportModelDetails {
    pub model: String,
    pub os_path: String,
    pub download_from_hf: Option<bool>,
    pub local_dir: Option<String>,
    pub cleanup_model_cache: Option<bool>,
    pub inference_container: Option<String>,
    pub finetuning_container: Option<String>,
    pub compartment_id: Option<String>,
    pub project_id: Option<String>,
    pub model_file: Option<String>,
    pub inference_container_uri: Option<String>,
    pub allow_patterns: Option<Vec<String>>,
    pub ignore_patterns: Option<Vec<String>>,
    pub freeform_tags: Option<BTreeMap<String, String>>,
    pub defined_tags: Option<BTreeMap<String, BTreeMap<String, Value>>>,
    pub ignore_model_artifact_check: Option<bool>,
}

impl ImportModelDetails {
    pub const KEY: &'static str = "model_register";
    const COMMAND: &'static str = "model register";

    pub fn from_payload(payload: Value) -> AquaResult<Self> {
        let details: Self = serde_json::from_value(payload)
            .map_err(|e| AquaError::InvalidArgument(format!("Invalid parameters for `{}`: {e}", Self::KEY)))?;
        details.validate()?;
        Ok(details)
    }

    pub fn validate(&self) -> AquaResult<()> {
        if self.model.trim().is_empty() {
            return Err(AquaError::MissingField("`model` is required.".to_string()));
        }
        if self.os_path.trim().is_empty() {
            return Err(AquaError::MissingField("`os_path` is required.".to_string()));
        }
        Ok(())
    }

    /// 🔨 `ads aqua model register --model ... --os_path ...`, fields in declaration order,
    /// unset fields left out.
    pub fn build_cli(&self) -> AquaResult<String> {
        let the_params: Vec<(&str, Option<String>)> = vec![
            ("model", Some(self.model.clone())),
            ("os_path", Some(self.os_path.clone())),
            ("download_from_hf", self.download_from_hf.map(flag)),
            ("local_dir", self.local_dir.clone()),
            ("cleanup_model_cache", self.cleanup_model_cache.map(flag)),
            ("inference_container", self.inference_container.clone()),
            ("finetuning_container", self.finetuning_container.clone()),
            ("compartment_id", self.compartment_id.clone()),
            ("project_id", self.project_id.clone()),
            ("model_file", self.model_file.clone()),
            ("inference_container_uri", self.inference_container_uri.clone()),
            ("allow_patterns", encoded(&self.allow_patterns)?),
            ("ignore_patterns", encoded(&self.ignore_patterns)?),
            ("freeform_tags", encoded(&self.freeform_tags)?),
            ("defined_tags", encoded(&self.defined_tags)?),
            ("ignore_model_artifact_check", self.ignore_model_artifact_check.map(flag)),
        ];

        let the_args: Vec<String> = the_params
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| format!("--{name} {v}")))
            .collect();
        Ok(format!("ads aqua {} {}", Self::COMMAND, the_args.join(" ")))
    }
}

fn flag(value: bool) -> String {
    // 🐍 the CLI on the other end parses Python literals
    let the_literal = if value { "True" } else { "False" };
    the_literal.to_string()
}

fn encoded<T: serde::Serialize>(value: &Option<T>) -> AquaResult<Option<String>> {
    value.as_ref().map(serde_json::to_string).transpose().map_err(AquaError::from)
}
