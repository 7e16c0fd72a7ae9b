use anyhow::Result;
use cova_core::model::OverrideGroup;
use cova_core::{Gateway, RunRequest, UploadFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::jsonrpc::{error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

#[derive(Debug, Default, Deserialize)]
struct DefaultsParams {
    region: Option<String>,
    #[serde(default)]
    merge: bool,
}

#[derive(Debug, Default, Deserialize)]
struct UploadParams {
    path: Option<PathBuf>,
    content: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunSimParams {
    sim_pars: OverrideGroup,
    epi_pars: OverrideGroup,
    #[serde(default = "default_verbose")]
    verbose: bool,
    session: Option<String>,
}

/// Line-delimited JSON-RPC front end for a [`Gateway`].
#[derive(Clone)]
pub struct Server {
    gateway: Arc<Gateway>,
    runs: Arc<Semaphore>,
}

impl Server {
    pub fn new(gateway: Gateway) -> Self {
        let permits = gateway.config().server.max_concurrent_runs.max(1);
        Self {
            gateway: Arc::new(gateway),
            runs: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Serve until `reader` reaches EOF, then wait for in-flight requests.
    ///
    /// A line that is not valid UTF-8 is answered with a parse error; the
    /// loop only stops on EOF or a read failure.
    pub async fn run<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let writer = Arc::new(Mutex::new(BufWriter::new(writer)));
        let mut inflight = JoinSet::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = match String::from_utf8(std::mem::take(&mut buf)) {
                Ok(line) => Ok(line),
                Err(e) => {
                    warn!(error = %e, "request line is not valid UTF-8");
                    Err(e.utf8_error())
                }
            };
            if matches!(&line, Ok(l) if l.trim().is_empty()) {
                continue;
            }

            let server = self.clone();
            let writer = writer.clone();
            inflight.spawn(async move {
                let response = match line {
                    Ok(line) => server.handle_line(&line).await,
                    Err(e) => Some(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {e}")),
                    )),
                };
                if let Some(response) = response {
                    write_response(&writer, &response).await;
                }
            });

            while let Some(joined) = inflight.try_join_next() {
                log_join(joined);
            }
        }

        while let Some(joined) = inflight.join_next().await {
            log_join(joined);
        }
        writer.lock().await.flush().await?;
        Ok(())
    }

    /// Handle one raw request line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparsable request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };
        let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
        let req: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id_hint,
                    JsonRpcError::new(error_codes::INVALID_REQUEST, format!("Invalid request: {e}")),
                ));
            }
        };

        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                req.id.unwrap_or(Value::Null),
                JsonRpcError::new(
                    error_codes::INVALID_REQUEST,
                    format!("Invalid request: unsupported jsonrpc version \"{}\"", req.jsonrpc),
                ),
            ));
        }

        debug!(method = %req.method, id = ?req.id, "request");
        let outcome = self.dispatch(&req).await;
        if req.is_notification() {
            return None;
        }
        let id = req.id.unwrap_or(Value::Null);
        Some(match outcome {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(err) => JsonRpcResponse::error(id, err),
        })
    }

    async fn dispatch(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match req.method.as_str() {
            "get_defaults" => {
                let p: DefaultsParams = req.typed_params()?;
                to_value(self.gateway.get_defaults(p.region.as_deref(), p.merge))
            }
            "get_version" => {
                let gateway = self.gateway.clone();
                let version = blocking(move || gateway.get_version()).await?;
                let version = version
                    .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))?;
                Ok(Value::String(version))
            }
            "upload_pars" => {
                let p: UploadParams = req.typed_params()?;
                let gateway = self.gateway.clone();
                let uploaded = match (p.path, p.content) {
                    (Some(path), _) => blocking(move || gateway.upload_pars(&path)).await?,
                    (None, Some(content)) => {
                        let format = match p.format.as_deref() {
                            None => UploadFormat::default(),
                            Some(name) => UploadFormat::from_name(name).ok_or_else(|| {
                                invalid_params(format!("unsupported upload format \"{name}\""))
                            })?,
                        };
                        blocking(move || gateway.upload_content(&content, format)).await?
                    }
                    (None, None) => {
                        return Err(invalid_params("upload_pars requires \"path\" or \"content\""))
                    }
                };
                to_value(uploaded.map_err(|e| invalid_params(e.to_string()))?)
            }
            "run_sim" => {
                let p: RunSimParams = req.typed_params()?;
                let _permit = self
                    .runs
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))?;
                let gateway = self.gateway.clone();
                let request = RunRequest {
                    sim_pars: p.sim_pars,
                    epi_pars: p.epi_pars,
                };
                let result = blocking(move || {
                    gateway.run_sim(request, p.verbose, p.session.as_deref())
                })
                .await?;
                to_value(result)
            }
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }
}

fn default_verbose() -> bool {
    true
}

async fn write_response<W>(writer: &Mutex<BufWriter<W>>, response: &JsonRpcResponse)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut out = match serde_json::to_string(response) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            return;
        }
    };
    out.push('\n');
    let mut w = writer.lock().await;
    if let Err(e) = w.write_all(out.as_bytes()).await {
        error!(error = %e, "failed to write response");
        return;
    }
    let _ = w.flush().await;
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "request task failed");
    }
}

async fn blocking<T, F>(f: F) -> Result<T, JsonRpcError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
}

fn invalid_params(message: impl Into<String>) -> JsonRpcError {
    JsonRpcError::new(error_codes::INVALID_PARAMS, message)
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
}
