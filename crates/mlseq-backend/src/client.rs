//! reqwest implementation of [`ConversionBackend`].

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::BoxFuture;
use mlseq_core::{
    BackendConfig, ConversionBackend, ConvertError, ConvertRequest, ConvertResult,
    DiscoveryError, ModelCatalog, ModelFormat,
};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

use crate::error::{BackendError, BackendResult};

/// Client for the conversion service.
///
/// Conversions go to the active endpoint, which starts as the primary URL.
/// Model discovery tries the primary and then, once, the backup; whichever
/// answers becomes the active endpoint.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

#[derive(Debug)]
struct Endpoints {
    primary: String,
    backup: Option<String>,
    active: RwLock<String>,
}

impl Endpoints {
    fn active(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn activate(&self, url: &str) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = url.to_string();
    }
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let primary = normalize_url(&config.url)?;
        let backup = config.backup_url.as_deref().map(normalize_url).transpose()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoints: Arc::new(Endpoints {
                active: RwLock::new(primary.clone()),
                primary,
                backup,
            }),
        })
    }

    /// Endpoint conversions are currently sent to.
    pub fn active_url(&self) -> String {
        self.endpoints.active()
    }
}

impl ConversionBackend for HttpBackend {
    fn convert(&self, request: ConvertRequest) -> BoxFuture<'static, ConvertResult<Vec<u8>>> {
        let client = self.client.clone();
        let url = format!("{}/convert/{}", self.endpoints.active(), request.model);

        Box::pin(async move {
            let form = convert_form(request)?;
            debug!(url = %url, "posting conversion");

            let response = client
                .post(&url)
                .multipart(form)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ConvertError::Status {
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await.map_err(transport_error)?;
            Ok(bytes.to_vec())
        })
    }

    fn list_models(&self) -> BoxFuture<'static, Result<ModelCatalog, DiscoveryError>> {
        let client = self.client.clone();
        let endpoints = Arc::clone(&self.endpoints);

        Box::pin(async move {
            let primary_err = match fetch_catalog(&client, &endpoints.primary).await {
                Ok(catalog) => {
                    endpoints.activate(&endpoints.primary);
                    return Ok(catalog);
                }
                Err(err) => err,
            };
            warn!(url = %endpoints.primary, error = %primary_err, "model discovery failed");

            let Some(backup) = endpoints.backup.as_deref() else {
                return Err(DiscoveryError::Unavailable { cause: primary_err });
            };

            match fetch_catalog(&client, backup).await {
                Ok(catalog) => {
                    info!(url = %backup, "switched to backup backend");
                    endpoints.activate(backup);
                    Ok(catalog)
                }
                Err(err) => {
                    warn!(url = %backup, error = %err, "backup discovery failed");
                    Err(DiscoveryError::Unavailable {
                        cause: format!("{}; backup: {}", primary_err, err),
                    })
                }
            }
        })
    }
}

fn convert_form(request: ConvertRequest) -> ConvertResult<Form> {
    let options =
        serde_json::to_string(&request.options).map_err(|e| ConvertError::Encode(e.to_string()))?;

    let format = request.payload.format;
    let part = Part::bytes(request.payload.bytes)
        .file_name(format!("chunk.{}", file_extension(format)))
        .mime_str(request.payload.mime)
        .map_err(|e| ConvertError::Encode(e.to_string()))?;

    Ok(Form::new()
        .part(format.as_str(), part)
        .text("options", options)
        .text("bpm", request.bpm.to_string()))
}

async fn fetch_catalog(client: &reqwest::Client, base: &str) -> Result<ModelCatalog, String> {
    let response = client
        .get(format!("{}/models", base))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    response
        .json::<ModelCatalog>()
        .await
        .map_err(|e| e.to_string())
}

fn transport_error(err: reqwest::Error) -> ConvertError {
    ConvertError::Transport(err.to_string())
}

fn file_extension(format: ModelFormat) -> &'static str {
    match format {
        ModelFormat::Midi => "mid",
        ModelFormat::MusicXml => "musicxml",
    }
}

/// Trims trailing slashes and rejects anything but http(s) URLs.
fn normalize_url(url: &str) -> BackendResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(BackendError::InvalidUrl(url.to_string()))
    }
}
