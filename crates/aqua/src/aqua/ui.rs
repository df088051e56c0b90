//! 🖼️ AquaUiApp: the lookups behind every dropdown in the AQUA console.
//!
//! 🎬 COLD OPEN: INT. NOTEBOOK: A USER OPENS THE "DEPLOY" DIALOG
//!
//! Seven dropdowns. Seven services. One impatient human. Everything here is a
//! thin read over an OCI list call, reshaped into the JSON the console expects.
//! The only state is the compartment cache: walking a whole tenancy is slow, so
//! we do it once per tenancy until someone hits "refresh". 🦆

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::app_config::DefaultsConfig;
use crate::error::{AquaError, AquaResult};
use crate::object_storage_uri::ObjectStorageUri;
use crate::oci::OciClients;

pub const TAG_AQUA_EVALUATION: &str = "aqua_evaluation";
pub const TAG_AQUA_FINETUNING: &str = "aqua_finetuning";
pub const DEFAULT_PRIVATE_ENDPOINT_RESOURCE_TYPE: &str = "MODEL_DEPLOYMENT";
const LIMITS_SERVICE_NAME: &str = "data-science";
const CONTAINER_URI_SCHEME: &str = "dsmc://";
const BUCKET_LOOKUP_CONCURRENCY: usize = 8;

/// 📦 One service-managed container, as the console draws it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AquaContainer {
    pub name: String,
    pub version: String,
    pub display_name: String,
    pub family: String,
    pub platforms: Vec<String>,
    pub model_formats: Vec<String>,
    pub spec: Option<ContainerSpec>,
    pub usages: Vec<String>,
}

/// 🚀 How an inference container wants to be launched.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContainerSpec {
    pub cli_param: String,
    pub env_vars: Vec<BTreeMap<String, String>>,
    pub health_check_port: String,
    pub restricted_params: Vec<String>,
    pub server_port: String,
    pub evaluation_configuration: Value,
}

/// 🗂️ Containers sorted into the three tabs of the console.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ContainerGroups {
    pub inference: Vec<AquaContainer>,
    pub finetune: Vec<AquaContainer>,
    pub evaluate: Vec<AquaContainer>,
}

#[derive(Debug, Clone)]
pub struct AquaUiApp {
    clients: OciClients,
    defaults: DefaultsConfig,
    compartments_cache: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl AquaUiApp {
    pub fn new(clients: OciClients, defaults: DefaultsConfig) -> Self {
        Self {
            clients,
            defaults,
            compartments_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 🧭 The explicit compartment, or the one the environment gave us.
    fn compartment<'a>(&'a self, compartment_id: Option<&'a str>) -> AquaResult<&'a str> {
        compartment_id
            .filter(|c| !c.trim().is_empty())
            .or(self.defaults.compartment_id.as_deref())
            .ok_or_else(|| {
                AquaError::MissingField("No compartment id found from environment variables.".to_string())
            })
    }

    fn tenancy(&self) -> AquaResult<&str> {
        self.defaults
            .tenancy_id
            .as_deref()
            .ok_or_else(|| AquaError::MissingField("TENANCY_OCID variable is not set.".to_string()))
    }

    // ===== 🪵 logging =====

    pub async fn list_log_groups(&self, compartment_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("🪵 Loading log groups from compartment: {the_compartment}");
        self.clients.logging.list_log_groups(the_compartment).await
    }

    pub async fn list_logs(&self, log_group_id: &str) -> AquaResult<Vec<Value>> {
        info!("🪵 Loading logs from log group: {log_group_id}");
        self.clients.logging.list_logs(log_group_id).await
    }

    // ===== 🏛️ compartments =====

    /// 🌳 Root tenancy compartment first, then every compartment beneath it.
    pub async fn list_compartments(&self) -> AquaResult<Vec<Value>> {
        let the_tenancy = self.tenancy()?.to_string();
        if let Some(cached) = self.compartments_cache.read().await.get(&the_tenancy) {
            debug!("🗃️ compartments for {the_tenancy} served from cache");
            return Ok(cached.clone());
        }

        info!("🏛️ Loading compartments from tenancy: {the_tenancy}");
        let root = self.clients.identity.get_compartment(&the_tenancy).await?;
        let mut everything = vec![root];
        everything.extend(
            self.clients
                .identity
                .list_compartments_in_subtree(&the_tenancy)
                .await?,
        );
        self.compartments_cache
            .write()
            .await
            .insert(the_tenancy, everything.clone());
        Ok(everything)
    }

    pub async fn clear_compartments_list_cache(&self) -> AquaResult<Value> {
        let the_tenancy = self.tenancy()?.to_string();
        self.compartments_cache.write().await.clear();
        info!("🧹 compartment cache cleared");
        Ok(json!({ "key": { "tenancy_ocid": the_tenancy } }))
    }

    pub fn get_default_compartment(&self) -> Value {
        let the_compartment = self.defaults.compartment_id.clone().unwrap_or_default();
        if the_compartment.is_empty() {
            error!("No compartment id found from environment variables.");
        }
        json!({ "compartment_id": the_compartment })
    }

    // ===== 🧪 version sets =====

    /// 🏷️ Active model version sets carrying the `target_tag` freeform tag.
    pub async fn list_model_version_sets(
        &self,
        compartment_id: Option<&str>,
        target_tag: &str,
    ) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        let the_label = if target_tag == TAG_AQUA_EVALUATION {
            "experiments"
        } else {
            "modelversionsets"
        };
        info!("Loading {the_label} from compartment: {the_compartment}");
        let the_sets = self
            .clients
            .data_science
            .list_model_version_sets(the_compartment)
            .await?;
        Ok(the_sets
            .into_iter()
            .filter(|set| set.pointer(&format!("/freeformTags/{target_tag}")).is_some())
            .collect())
    }

    // ===== 🪣 buckets =====

    pub async fn list_buckets(&self, compartment_id: Option<&str>, versioned: bool) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        let the_namespace = self.clients.object_storage.get_namespace().await?;
        info!("🪣 Loading buckets from compartment: {the_compartment}");
        let buckets = self
            .clients
            .object_storage
            .list_buckets(&the_namespace, the_compartment)
            .await?;
        if !versioned {
            return Ok(buckets);
        }

        // 🔍 listings don't carry the versioning flag, so each bucket gets a GET
        let object_storage = &self.clients.object_storage;
        let the_namespace = the_namespace.as_str();
        let the_checked: Vec<(Value, bool)> = stream::iter(buckets)
            .map(|bucket| async move {
                let name = bucket.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let details = object_storage.get_bucket(the_namespace, &name).await?;
                Ok::<_, AquaError>((bucket, details.is_versioned()))
            })
            .buffered(BUCKET_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(the_checked
            .into_iter()
            .filter_map(|(bucket, is_versioned)| is_versioned.then_some(bucket))
            .collect())
    }

    pub async fn is_bucket_versioned(&self, bucket_uri: &str) -> AquaResult<Value> {
        let the_uri = ObjectStorageUri::parse(bucket_uri)?;
        let bucket = self
            .clients
            .object_storage
            .get_bucket(&the_uri.namespace, &the_uri.bucket)
            .await?;
        Ok(json!({ "is_versioned": bucket.is_versioned() }))
    }

    // ===== 🖥️ shapes and capacity =====

    pub async fn list_job_shapes(&self, compartment_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("Loading job shapes from compartment: {the_compartment}");
        self.clients.data_science.list_job_shapes(the_compartment).await
    }

    pub async fn list_model_deployment_shapes(&self, compartment_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("Loading model deployment shapes from compartment: {the_compartment}");
        self.clients
            .data_science
            .list_model_deployment_shapes(the_compartment)
            .await
    }

    /// 🚦 How many of `instance_shape` the `limit_name` quota still allows.
    pub async fn get_shape_availability(
        &self,
        compartment_id: Option<&str>,
        instance_shape: &str,
        limit_name: &str,
    ) -> AquaResult<Value> {
        if instance_shape.trim().is_empty() {
            return Err(AquaError::InvalidArgument(
                "instance_shape argument is required.".to_string(),
            ));
        }
        let the_compartment = self.compartment(compartment_id)?;
        let availability = self
            .clients
            .limits
            .get_resource_availability(LIMITS_SERVICE_NAME, limit_name, the_compartment)
            .await?;
        let available = availability.available.unwrap_or(0);
        if available <= 0 {
            return Err(AquaError::InvalidArgument(format!(
                "Inadequate resource is available to create the {instance_shape} resource. The number of available resource associated with the limit name {limit_name} is {available}."
            )));
        }
        Ok(json!({ "available_count": available }))
    }

    pub async fn list_capacity_reservations(&self, compartment_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("Loading capacity reservations from compartment: {the_compartment}");
        self.clients
            .compute
            .list_compute_capacity_reservations(the_compartment)
            .await
    }

    pub fn is_capacity_reservation_enabled(&self) -> Value {
        json!({ "status": self.defaults.byor_enabled })
    }

    // ===== 🕸️ networking =====

    pub async fn list_vcn(&self, compartment_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("Loading VCN list from compartment: {the_compartment}");
        self.clients.virtual_network.list_vcns(the_compartment).await
    }

    pub async fn list_subnets(&self, compartment_id: Option<&str>, vcn_id: Option<&str>) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        info!("Loading subnet list from compartment: {the_compartment}");
        self.clients
            .virtual_network
            .list_subnets(the_compartment, vcn_id.filter(|v| !v.is_empty()))
            .await
    }

    pub async fn list_private_endpoints(
        &self,
        compartment_id: Option<&str>,
        resource_type: Option<&str>,
    ) -> AquaResult<Vec<Value>> {
        let the_compartment = self.compartment(compartment_id)?;
        let the_type = resource_type
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_PRIVATE_ENDPOINT_RESOURCE_TYPE);
        info!("Loading private endpoints of type {the_type} from compartment: {the_compartment}");
        self.clients
            .data_science
            .list_private_endpoints(the_compartment, the_type)
            .await
    }

    // ===== 📦 containers =====

    pub async fn list_containers(&self) -> AquaResult<ContainerGroups> {
        let raw = self.clients.data_science.list_containers().await?;
        Ok(group_containers(&raw))
    }
}

/// 🗂️ Sort active containers into tabs by usage. A container with several usages shows up in each tab.
pub fn group_containers(raw: &[Value]) -> ContainerGroups {
    let mut groups = ContainerGroups::default();
    for item in raw {
        let state = item.get("lifecycleState").and_then(Value::as_str).unwrap_or("ACTIVE");
        if state != "ACTIVE" {
            continue;
        }
        let container = to_container(item);
        let has = |wanted: &[&str]| container.usages.iter().any(|u| wanted.contains(&u.as_str()));
        if has(&["INFERENCE", "BATCH_INFERENCE"]) {
            groups.inference.push(container.clone());
        }
        if has(&["FINE_TUNE"]) {
            groups.finetune.push(container.clone());
        }
        if has(&["EVALUATION"]) {
            groups.evaluate.push(container);
        }
    }
    groups
}

fn str_at<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_container(item: &Value) -> AquaContainer {
    let usages: Vec<String> = item
        .get("usages")
        .and_then(Value::as_array)
        .map(|u| u.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let the_deployment_config = item
        .get("workloadConfigurationDetailsList")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .find(|w| str_at(w, "workloadType") == "MODEL_DEPLOYMENT")
        });
    let the_extras = the_deployment_config
        .and_then(|w| w.get("additionalConfigurations"))
        .cloned()
        .unwrap_or(Value::Null);

    AquaContainer {
        name: format!("{CONTAINER_URI_SCHEME}{}", str_at(item, "containerName")),
        version: str_at(item, "tag").to_string(),
        display_name: str_at(item, "displayName").to_string(),
        family: str_at(item, "familyName").to_string(),
        platforms: comma_list(str_at(&the_extras, "platforms")),
        model_formats: comma_list(str_at(&the_extras, "modelFormats")),
        spec: the_deployment_config.map(|config| to_spec(config, &the_extras)),
        usages,
    }
}

fn to_spec(config: &Value, extras: &Value) -> ContainerSpec {
    let port = |key: &str| match config.get(key) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let server_port = port("serverPort");
    let health_check_port = port("healthCheckPort");

    // 🌱 SCREAMING_CASE keys are environment, everything else is metadata
    let mut env_vars: Vec<BTreeMap<String, String>> = extras
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(k, _)| k.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
                .map(|(k, v)| BTreeMap::from([(k.clone(), v.as_str().unwrap_or_default().to_string())]))
                .collect()
        })
        .unwrap_or_default();
    if !server_port.is_empty() {
        env_vars.push(BTreeMap::from([("PORT".to_string(), server_port.clone())]));
    }
    if !health_check_port.is_empty() {
        env_vars.push(BTreeMap::from([(
            "HEALTH_CHECK_PORT".to_string(),
            health_check_port.clone(),
        )]));
    }

    let restricted_params = serde_json::from_str::<Vec<String>>(str_at(extras, "restrictedParams")).unwrap_or_default();

    ContainerSpec {
        cli_param: str_at(config, "cmd").to_string(),
        env_vars,
        health_check_port,
        restricted_params,
        server_port,
        evaluation_configuration: json!({}),
    }
}
