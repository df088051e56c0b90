//! 📈 Forecast operator config: the YAML a user writes to say "predict next quarter, please".
//!
//! Parsing is plain serde. The interesting part is [`ForecastOperatorSpec::finalize`],
//! which fills every unset knob with its default exactly once, so a spec that
//! went YAML → struct → YAML → struct ends up identical.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{AquaError, AquaResult};

pub const OPERATOR_KIND: &str = "operator";
pub const FORECAST_TYPE: &str = "forecast";
pub const FORECAST_VERSION: &str = "v1";

pub const SUPPORTED_METRICS: [&str; 5] = ["smape", "mape", "rmse", "r2", "explained_variance"];
pub const SUPPORTED_MODELS: [&str; 6] = ["prophet", "arima", "neuralprophet", "automlx", "autots", "auto-select"];
const DEFAULT_OUTPUT_DIR: &str = "results";
const MAX_OUTPUT_SUFFIX: u32 = 10_000;

/// 📥 Where a dataset comes from: a file/URL, or a SQL query against a connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputData {
    pub format: Option<String>,
    pub columns: Option<Vec<String>>,
    pub url: Option<String>,
    pub options: Option<BTreeMap<String, Value>>,
    pub limit: Option<u64>,
    pub sql: Option<String>,
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDirectory {
    pub format: Option<String>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub options: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingSteps {
    pub missing_value_imputation: bool,
    pub outlier_treatment: bool,
}

impl Default for PreprocessingSteps {
    fn default() -> Self {
        Self {
            missing_value_imputation: true,
            outlier_treatment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPreprocessor {
    pub enabled: bool,
    pub steps: PreprocessingSteps,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self {
            enabled: true,
            steps: PreprocessingSteps::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateTimeColumn {
    pub name: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub n_trials: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoScaling {
    pub minimum_instance: u32,
    pub maximum_instance: Option<u32>,
    pub cool_down_in_seconds: u32,
    pub scale_in_threshold: u32,
    pub scale_out_threshold: u32,
    pub scaling_metric: String,
}

impl Default for AutoScaling {
    fn default() -> Self {
        Self {
            minimum_instance: 1,
            maximum_instance: None,
            cool_down_in_seconds: 600,
            scale_in_threshold: 10,
            scale_out_threshold: 80,
            scaling_metric: "CPU_UTILIZATION".to_string(),
        }
    }
}

/// 🚀 The deployment a what-if analysis stands up next to the forecast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDeploymentServer {
    pub display_name: Option<String>,
    pub initial_shape: Option<String>,
    pub description: Option<String>,
    pub log_group: Option<String>,
    pub log_id: Option<String>,
    pub auto_scaling: AutoScaling,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatIfAnalysis {
    pub model_display_name: Option<String>,
    pub compartment_id: Option<String>,
    pub project_id: Option<String>,
    pub model_deployment: ModelDeploymentServer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOperatorSpec {
    pub name: Option<String>,
    pub historical_data: InputData,
    pub additional_data: InputData,
    pub test_data: InputData,
    pub output_directory: Option<OutputDirectory>,
    pub report_filename: Option<String>,
    pub report_title: Option<String>,
    pub report_theme: Option<String>,
    pub metrics_filename: Option<String>,
    pub test_metrics_filename: Option<String>,
    pub forecast_filename: Option<String>,
    pub global_explanation_filename: Option<String>,
    pub local_explanation_filename: Option<String>,
    pub target_column: Option<String>,
    pub preprocessing: DataPreprocessor,
    pub datetime_column: DateTimeColumn,
    pub target_category_columns: Vec<String>,
    pub generate_report: Option<bool>,
    pub generate_forecast_file: Option<bool>,
    pub generate_metrics: Option<bool>,
    pub generate_metrics_file: Option<bool>,
    pub generate_explanations: Option<bool>,
    pub generate_explanation_files: Option<bool>,
    pub explanations_accuracy_mode: Option<String>,
    pub horizon: Option<i64>,
    pub model: Option<String>,
    pub model_kwargs: BTreeMap<String, Value>,
    pub model_parameters: Option<String>,
    pub previous_output_dir: Option<String>,
    pub generate_model_parameters: Option<bool>,
    pub generate_model_pickle: Option<bool>,
    pub confidence_interval_width: Option<f64>,
    pub metric: Option<String>,
    pub tuning: Tuning,
    pub what_if_analysis: Option<WhatIfAnalysis>,
    pub errors_dict_filename: Option<String>,
}

fn or_default(slot: &mut Option<String>, value: &str) {
    if slot.as_deref().is_none_or(str::is_empty) {
        *slot = Some(value.to_string());
    }
}

impl ForecastOperatorSpec {
    /// 🧮 Fill defaults, resolving a missing output directory against the working directory.
    pub fn finalize(&mut self) -> AquaResult<()> {
        self.finalize_in(Path::new("."))
    }

    /// 🧮 Same as [`Self::finalize`], with `results`/`results_N` looked up under `root`.
    pub fn finalize_in(&mut self, root: &Path) -> AquaResult<()> {
        if self.output_directory.as_ref().is_none_or(|o| o.url.is_none()) {
            let the_url = find_output_dirname(root)?;
            debug!("📁 no output directory given, using {}", the_url.display());
            let mut the_output = self.output_directory.take().unwrap_or_default();
            the_output.url = Some(the_url.to_string_lossy().into_owned());
            self.output_directory = Some(the_output);
        }

        let the_wants_pickle = self.generate_model_pickle.unwrap_or(false) || self.what_if_analysis.is_some();
        self.generate_model_pickle = Some(the_wants_pickle);

        self.metric = Some(
            self.metric
                .as_deref()
                .map(str::to_lowercase)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "smape".to_string()),
        );
        or_default(&mut self.model, "prophet");
        if self.confidence_interval_width.is_none_or(|w| w == 0.0) {
            self.confidence_interval_width = Some(0.80);
        }
        or_default(&mut self.report_filename, "report.html");

        for flag in [
            &mut self.generate_report,
            &mut self.generate_metrics,
            &mut self.generate_metrics_file,
            &mut self.generate_forecast_file,
            &mut self.generate_explanation_files,
        ] {
            flag.get_or_insert(true);
        }
        self.generate_explanations.get_or_insert(false);
        self.generate_model_parameters.get_or_insert(false);

        or_default(&mut self.explanations_accuracy_mode, "FAST_APPROXIMATE");
        or_default(&mut self.report_title, "Forecast Report");
        or_default(&mut self.report_theme, "light");
        or_default(&mut self.metrics_filename, "metrics.csv");
        or_default(&mut self.test_metrics_filename, "test_metrics.csv");
        or_default(&mut self.forecast_filename, "forecast.csv");
        or_default(&mut self.global_explanation_filename, "global_explanation.csv");
        or_default(&mut self.local_explanation_filename, "local_explanation.csv");
        or_default(&mut self.target_column, "Sales");
        self.errors_dict_filename = Some("errors.json".to_string());
        Ok(())
    }

    pub fn validate(&self) -> AquaResult<()> {
        if self.historical_data.url.as_deref().is_none_or(str::is_empty) {
            return Err(AquaError::Validation("`historical_data.url` is required.".to_string()));
        }
        if self.datetime_column.name.as_deref().is_none_or(str::is_empty) {
            return Err(AquaError::Validation("`datetime_column.name` is required.".to_string()));
        }
        match self.horizon {
            Some(h) if h > 0 => {}
            _ => {
                return Err(AquaError::Validation(
                    "`horizon` must be a positive integer.".to_string(),
                ));
            }
        }
        let the_metric = self.metric.as_deref().unwrap_or_default();
        if !SUPPORTED_METRICS.contains(&the_metric) {
            return Err(AquaError::Validation(format!(
                "Unsupported metric `{the_metric}`. Supported metrics: {}.",
                SUPPORTED_METRICS.join(", ")
            )));
        }
        let the_model = self.model.as_deref().unwrap_or_default();
        if !SUPPORTED_MODELS.contains(&the_model) {
            return Err(AquaError::Validation(format!(
                "Unsupported model `{the_model}`. Supported models: {}.",
                SUPPORTED_MODELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// 📁 `root/results`, or the first free `root/results_N`.
pub fn find_output_dirname(root: &Path) -> AquaResult<PathBuf> {
    first_free_output_dir(root, MAX_OUTPUT_SUFFIX)
}

fn first_free_output_dir(root: &Path, max_suffix: u32) -> AquaResult<PathBuf> {
    let the_base = root.join(DEFAULT_OUTPUT_DIR);
    if !the_base.exists() {
        return Ok(the_base);
    }
    (1..=max_suffix)
        .map(|n| root.join(format!("{DEFAULT_OUTPUT_DIR}_{n}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| {
            AquaError::InvalidArgument(format!(
                "No free output directory under `{}`: `{DEFAULT_OUTPUT_DIR}` through `{DEFAULT_OUTPUT_DIR}_{max_suffix}` are all taken. Set `output_directory.url` explicitly.",
                root.display()
            ))
        })
}

fn default_kind() -> String {
    OPERATOR_KIND.to_string()
}

fn default_type() -> String {
    FORECAST_TYPE.to_string()
}

fn default_version() -> String {
    FORECAST_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOperatorConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(rename = "type", default = "default_type")]
    pub operator_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub spec: ForecastOperatorSpec,
}

impl ForecastOperatorConfig {
    pub fn from_yaml(yaml: &str) -> AquaResult<Self> {
        Self::prepared(serde_yaml::from_str(yaml)?, Path::new("."))
    }

    pub fn from_value(value: Value) -> AquaResult<Self> {
        Self::prepared(serde_json::from_value(value)?, Path::new("."))
    }

    /// 📄 Read a YAML file; a missing output directory is resolved next to the working directory.
    pub fn from_yaml_file(path: &Path) -> AquaResult<Self> {
        if !path.exists() {
            return Err(AquaError::FileNotFound(path.display().to_string()));
        }
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    pub fn to_yaml(&self) -> AquaResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn prepared(mut config: Self, root: &Path) -> AquaResult<Self> {
        if config.kind != OPERATOR_KIND || config.operator_type != FORECAST_TYPE {
            return Err(AquaError::Validation(format!(
                "Expected kind `{OPERATOR_KIND}` and type `{FORECAST_TYPE}`, got `{}` and `{}`.",
                config.kind, config.operator_type
            )));
        }
        config.spec.finalize_in(root)?;
        config.spec.validate()?;
        Ok(config)
    }
}
