use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::web::{Data, Json, Path, ServiceConfig};
use actix_web::{get, post, HttpResponse, Responder, ResponseError};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::annotations::is_source_eligible;
use crate::clone::clone_namespace;
use crate::poll::PollSettings;
use crate::store::{KubeStore, NamespaceStore};
use crate::{mutations, views, Error, Metrics};

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(ResponseError::status_code(self))
            .json(json!({ "error": self.to_string() }))
    }
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
        }
    }
}

/// State shared between the web server workers
#[derive(Clone)]
pub struct AppState {
    store: KubeStore,
    poll: PollSettings,
    metrics: Metrics,
    registry: Registry,
    diagnostics: Arc<RwLock<Diagnostics>>,
}

impl AppState {
    pub fn new(store: KubeStore, poll: PollSettings) -> Self {
        let registry = Registry::default();
        let metrics = Metrics::default().register(&registry).unwrap();
        Self {
            store,
            poll,
            metrics,
            registry,
            diagnostics: Arc::new(RwLock::new(Diagnostics::default())),
        }
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    async fn touch(&self) {
        self.diagnostics.write().await.last_event = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRequest {
    pub target_namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct ImagePatchRequest {
    pub namespace: String,
    pub container: String,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct SecretPatchRequest {
    pub namespace: String,
    pub data: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigMapPatchRequest {
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    pub namespace: String,
    pub up: bool,
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub namespace: String,
    pub suspended: bool,
}

#[get("/api/v1/namespaces")]
async fn get_namespaces(state: Data<AppState>) -> Result<HttpResponse, Error> {
    let namespaces = views::list_cloneable_namespaces(&state.store).await?;
    Ok(HttpResponse::Ok().json(namespaces))
}

#[get("/api/v1/namespaces/{namespace}/deployments")]
async fn get_active_deployments(
    state: Data<AppState>,
    path: Path<String>,
) -> Result<HttpResponse, Error> {
    let deployments = views::list_active_deployments(&state.store, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(deployments))
}

#[get("/api/v1/namespaces/{namespace}/deployments/display")]
async fn get_deployment_containers(
    state: Data<AppState>,
    path: Path<String>,
) -> Result<HttpResponse, Error> {
    let containers = views::list_deployment_containers(&state.store, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(containers))
}

#[get("/api/v1/namespaces/{namespace}/secrets/display")]
async fn get_secret_keys(state: Data<AppState>, path: Path<String>) -> Result<HttpResponse, Error> {
    let secrets = views::list_secret_keys(&state.store, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(secrets))
}

#[get("/api/v1/namespaces/{namespace}/configmaps/display")]
async fn get_config_map_data(
    state: Data<AppState>,
    path: Path<String>,
) -> Result<HttpResponse, Error> {
    let config_maps = views::list_config_map_data(&state.store, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(config_maps))
}

#[post("/api/v1/namespaces/{namespace}/clone")]
async fn post_clone(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<CloneRequest>,
) -> Result<HttpResponse, Error> {
    let source = path.into_inner();
    let target = body.into_inner().target_namespace;

    // only namespaces annotated as clone sources may be cloned from
    let namespace = state.store.get_namespace(&source).await?;
    if !is_source_eligible(&namespace) {
        return Err(Error::SourceNotCloneable(source));
    }

    state.touch().await;
    let _timer = state.metrics.count_and_measure();
    match clone_namespace(&state.store, &state.poll, &source, &target).await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "message": format!("namespace {source} cloned to {target}"),
            "stages": report.stages,
        }))),
        Err(err) => {
            state.metrics.clone_failure(&err);
            Err(err)
        }
    }
}

#[post("/api/v1/deployments/{deployment}")]
async fn post_deployment_image(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<ImagePatchRequest>,
) -> Result<HttpResponse, Error> {
    let deployment = path.into_inner();
    let body = body.into_inner();
    state.touch().await;
    state.metrics.mutation("patch_image");
    mutations::patch_deployment_image(
        &state.store,
        &body.namespace,
        &deployment,
        &body.container,
        &body.image,
    )
    .await
    .map_err(|err| {
        state.metrics.mutation_failure("patch_image", &err);
        err
    })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("deployment {deployment} updated"),
    })))
}

#[post("/api/v1/secrets/{secret}")]
async fn post_secret_data(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<SecretPatchRequest>,
) -> Result<HttpResponse, Error> {
    let secret = path.into_inner();
    let body = body.into_inner();
    state.touch().await;
    state.metrics.mutation("patch_secret");
    mutations::patch_secret_data(&state.store, &body.namespace, &secret, &body.data)
        .await
        .map_err(|err| {
            state.metrics.mutation_failure("patch_secret", &err);
            err
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("secret {secret} updated"),
    })))
}

#[post("/api/v1/configmaps/{configmap}")]
async fn post_config_map_data(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<ConfigMapPatchRequest>,
) -> Result<HttpResponse, Error> {
    let config_map = path.into_inner();
    let body = body.into_inner();
    state.touch().await;
    state.metrics.mutation("patch_configmap");
    mutations::patch_config_map_data(&state.store, &body.namespace, &config_map, &body.data)
        .await
        .map_err(|err| {
            state.metrics.mutation_failure("patch_configmap", &err);
            err
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("configmap {config_map} updated"),
    })))
}

#[post("/api/v1/deployments/{deployment}/scale")]
async fn post_deployment_scale(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<ScaleRequest>,
) -> Result<HttpResponse, Error> {
    let deployment = path.into_inner();
    let body = body.into_inner();
    state.touch().await;
    state.metrics.mutation("scale");
    mutations::scale_deployment(&state.store, &body.namespace, &deployment, body.up)
        .await
        .map_err(|err| {
            state.metrics.mutation_failure("scale", &err);
            err
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("deployment {deployment} scaled"),
    })))
}

#[post("/api/v1/cronjobs/{cronjob}/suspend")]
async fn post_cron_job_suspend(
    state: Data<AppState>,
    path: Path<String>,
    body: Json<SuspendRequest>,
) -> Result<HttpResponse, Error> {
    let cron_job = path.into_inner();
    let body = body.into_inner();
    state.touch().await;
    state.metrics.mutation("suspend");
    mutations::set_cron_job_suspended(&state.store, &body.namespace, &cron_job, body.suspended)
        .await
        .map_err(|err| {
            state.metrics.mutation_failure("suspend", &err);
            err
        })?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("cronjob {cron_job} updated"),
    })))
}

#[get("/metrics")]
async fn get_metrics(state: Data<AppState>) -> impl Responder {
    let metrics = state.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&metrics, &mut buffer).unwrap();
    HttpResponse::Ok().body(buffer)
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(state: Data<AppState>) -> impl Responder {
    let diagnostics = state.diagnostics().await;
    HttpResponse::Ok().json(&diagnostics)
}

/// Registers every route on the server
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(index)
        .service(health)
        .service(get_metrics)
        .service(get_namespaces)
        .service(get_active_deployments)
        .service(get_deployment_containers)
        .service(get_secret_keys)
        .service(get_config_map_data)
        .service(post_clone)
        .service(post_deployment_image)
        .service(post_secret_data)
        .service(post_config_map_data)
        .service(post_deployment_scale)
        .service(post_cron_job_suspend);
}
