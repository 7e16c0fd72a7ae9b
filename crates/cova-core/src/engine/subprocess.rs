//! Engine backed by an external executable.
//!
//! Each operation spawns the engine command, writes one JSON request to its
//! stdin and reads one JSON response from stdout. The child is killed if it
//! overruns the configured deadline, so a wedged engine cannot hold a request
//! forever.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{
    Engine, EngineConfig, EngineOutput, EngineResult, EngineVersion, ResultTable, SERIES_DAY,
};
use crate::errors::EngineError;

/// Cap on captured stderr.
const MAX_STDERR_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessEngineConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for SubprocessEngineConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("covasim-engine"),
            args: Vec::new(),
            timeout_secs: 300,
        }
    }
}

impl SubprocessEngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Version,
    Run { config: &'a Map<String, Value> },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default = "default_true")]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    npts: Option<usize>,
    #[serde(default)]
    results: ResultTable,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    xlsx_base64: Option<String>,
    #[serde(default)]
    json: Option<String>,
}

impl RunResponse {
    fn into_output(self) -> EngineResult<EngineOutput> {
        let spreadsheet = match self.xlsx_base64 {
            Some(encoded) => Some(
                BASE64
                    .decode(encoded.trim())
                    .map_err(|e| EngineError::Protocol(format!("xlsx_base64: {e}")))?,
            ),
            None => None,
        };
        let npts = self
            .npts
            .unwrap_or_else(|| self.results.get(SERIES_DAY).map_or(0, <[f64]>::len));
        Ok(EngineOutput {
            npts,
            results: self.results,
            parameters: self.parameters,
            spreadsheet,
            json: self.json,
        })
    }
}

/// Raw result of one child invocation.
struct Exchange {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: String,
}

#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    cfg: SubprocessEngineConfig,
}

impl SubprocessEngine {
    pub fn new(cfg: SubprocessEngineConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &SubprocessEngineConfig {
        &self.cfg
    }

    fn exchange(&self, request: &Request<'_>) -> EngineResult<Exchange> {
        let mut child = Command::new(&self.cfg.command)
            .args(&self.cfg.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                command: self.cfg.command.display().to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let mut payload = serde_json::to_vec(request)?;
        payload.push(b'\n');
        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits without reading stdin is reported through its
            // exit status below, not as a broken pipe here.
            if let Err(e) = stdin.write_all(&payload) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e.into());
                }
            }
        }

        let timeout = self.cfg.timeout();
        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait(); // reap
                tracing::warn!(
                    command = %self.cfg.command.display(),
                    timeout_secs = self.cfg.timeout_secs,
                    "engine killed after deadline"
                );
                return Err(EngineError::Timeout { after: timeout });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        let stdout = join_drain(stdout)?;
        let mut stderr = String::from_utf8_lossy(&join_drain(stderr)?).into_owned();
        truncate_utf8(&mut stderr, MAX_STDERR_BYTES);

        Ok(Exchange {
            status,
            stdout,
            stderr,
        })
    }
}

impl Engine for SubprocessEngine {
    fn version(&self) -> EngineResult<EngineVersion> {
        let ex = self.exchange(&Request::Version)?;
        if !ex.status.success() {
            return Err(EngineError::Exit {
                code: ex.status.code(),
                stderr: ex.stderr,
            });
        }
        Ok(serde_json::from_slice(&ex.stdout)?)
    }

    fn run(&self, config: &EngineConfig) -> EngineResult<EngineOutput> {
        let flat = config.to_flat_map();
        let started = Instant::now();
        let ex = self.exchange(&Request::Run { config: &flat })?;
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = ?ex.status.code(),
            "engine exchange finished"
        );

        let response: RunResponse = match serde_json::from_slice(&ex.stdout) {
            Ok(r) => r,
            Err(e) if ex.status.success() => return Err(e.into()),
            Err(_) => {
                return Err(EngineError::Exit {
                    code: ex.status.code(),
                    stderr: ex.stderr,
                })
            }
        };

        let ok = response.ok && ex.status.success();
        let message = response.error.clone();
        let output = response.into_output()?;
        if ok {
            return Ok(output);
        }

        let message = message
            .or_else(|| (!ex.stderr.is_empty()).then(|| ex.stderr.clone()))
            .unwrap_or_else(|| "engine reported failure".to_string());
        let partial = (!output.results.is_empty()).then(|| Box::new(output));
        Err(EngineError::Run { message, partial })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<std::io::Result<Vec<u8>>>> {
    pipe.map(|mut p| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            p.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> EngineResult<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(h) => h
            .join()
            .map_err(|_| EngineError::Protocol("pipe reader thread panicked".into()))?
            .map_err(EngineError::from),
    }
}

fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Extension trait to add `wait_timeout` to `Child`.
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(20);

        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() >= timeout {
                        return Ok(None);
                    }
                    std::thread::sleep(poll_interval);
                }
            }
        }
    }
}
