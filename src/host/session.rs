use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AutofillError;
use crate::host::capability::{CodeInjection, ExecutionHost, PageHandle, StructuredInjection};
use crate::host::routine::PageRoutine;

pub const DEFAULT_HOST_SCRIPT: &str = "node/page-host/host_server.js";

/// Request sent to the host helper over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum HostRequest<'a> {
    ActivePage {
        cmd: &'static str,
    },
    Inject {
        cmd: &'static str,
        page: &'a str,
        function: &'a str,
        args: Vec<Value>,
    },
    InjectCode {
        cmd: &'static str,
        page: &'a str,
        source: &'a str,
    },
    Quit {
        cmd: &'static str,
    },
}

impl<'a> HostRequest<'a> {
    pub fn active_page() -> Self {
        HostRequest::ActivePage { cmd: "active_page" }
    }

    pub fn inject(page: &'a PageHandle, routine: &PageRoutine) -> Self {
        HostRequest::Inject {
            cmd: "inject",
            page: &page.0,
            function: routine.function_source(),
            args: routine.args(),
        }
    }

    pub fn inject_code(page: &'a PageHandle, source: &'a str) -> Self {
        HostRequest::InjectCode {
            cmd: "inject_code",
            page: &page.0,
            source,
        }
    }

    pub fn quit() -> Self {
        HostRequest::Quit { cmd: "quit" }
    }
}

/// Response from the host helper over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct HostResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub structured: Option<bool>,
    #[serde(default)]
    pub legacy: Option<bool>,
}

struct Channel {
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

/// A live browser reached through a long-lived Node.js helper.
///
/// The helper is spawned once and spoken to in NDJSON: one request line on
/// stdin, one response line on stdout. Its first line is a ready signal that
/// also advertises which injection capabilities the browser offers:
///
/// ```text
/// {"ok":true,"ready":true,"structured":true,"legacy":true}
/// ```
pub struct HostSession {
    child: Mutex<Child>,
    channel: Mutex<Channel>,
    structured: bool,
    legacy: bool,
}

impl HostSession {
    /// Launch the helper script and wait for its ready signal.
    pub async fn launch(script: &str) -> Result<Self, AutofillError> {
        let mut child = Command::new("node")
            .arg(script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AutofillError::SubprocessSpawn {
                script: script.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            AutofillError::SessionIO(format!("Failed to capture stdin of {}", script))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            AutofillError::SessionIO(format!("Failed to capture stdout of {}", script))
        })?;

        let mut channel = Channel {
            stdin,
            reader: BufReader::new(stdout),
        };

        let ready = read_response(&mut channel.reader, "ready signal").await?;
        if !ready.ok || ready.ready != Some(true) {
            return Err(AutofillError::SessionIO(format!(
                "Did not receive ready signal from {}",
                script
            )));
        }

        let structured = ready.structured.unwrap_or(false);
        let legacy = ready.legacy.unwrap_or(false);
        debug!(script, structured, legacy, "host session ready");

        Ok(Self {
            child: Mutex::new(child),
            channel: Mutex::new(channel),
            structured,
            legacy,
        })
    }

    /// Send a request and read the response.
    async fn send(&self, request: &HostRequest<'_>) -> Result<HostResponse, AutofillError> {
        let json = serde_json::to_string(request).map_err(|e| AutofillError::JsonParse {
            context: "HostRequest".into(),
            source: e,
        })?;

        let mut channel = self.channel.lock().await;
        channel
            .stdin
            .write_all(format!("{}\n", json).as_bytes())
            .await
            .map_err(|e| AutofillError::SessionIO(format!("Failed to write to host stdin: {}", e)))?;
        channel
            .stdin
            .flush()
            .await
            .map_err(|e| AutofillError::SessionIO(format!("Failed to flush host stdin: {}", e)))?;

        read_response(&mut channel.reader, "host response").await
    }

    /// Send a request and turn a host-reported failure into `HostExecution`.
    async fn send_ok(&self, request: &HostRequest<'_>) -> Result<HostResponse, AutofillError> {
        let response = self.send(request).await?;
        if !response.ok {
            return Err(AutofillError::HostExecution(
                response.error.unwrap_or_else(|| "Unknown error".into()),
            ));
        }
        Ok(response)
    }

    /// Ask the helper to disconnect and exit, then reap it.
    pub async fn quit(&self) -> Result<(), AutofillError> {
        if let Err(e) = self.send(&HostRequest::quit()).await {
            debug!(error = %e, "host already gone at quit");
        }
        let mut child = self.child.lock().await;
        if let Err(e) = child.wait().await {
            warn!(error = %e, "failed to reap host process");
        }
        Ok(())
    }
}

async fn read_response(
    reader: &mut BufReader<ChildStdout>,
    context: &str,
) -> Result<HostResponse, AutofillError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| AutofillError::SessionIO(format!("Failed to read {}: {}", context, e)))?;

    if line.trim().is_empty() {
        return Err(AutofillError::SessionIO(format!(
            "Empty {} (host process may have died)",
            context
        )));
    }

    serde_json::from_str(line.trim()).map_err(|e| AutofillError::JsonParse {
        context: context.to_string(),
        source: e,
    })
}

#[async_trait]
impl StructuredInjection for HostSession {
    async fn inject(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError> {
        let response = self.send_ok(&HostRequest::inject(page, routine)).await?;
        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl CodeInjection for HostSession {
    async fn inject_code(&self, page: &PageHandle, source: &str) -> Result<Value, AutofillError> {
        let response = self.send_ok(&HostRequest::inject_code(page, source)).await?;
        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ExecutionHost for HostSession {
    async fn active_page(&self) -> Result<Option<PageHandle>, AutofillError> {
        let response = self.send_ok(&HostRequest::active_page()).await?;
        Ok(response.page.filter(|p| !p.is_empty()).map(PageHandle))
    }

    fn structured(&self) -> Option<&dyn StructuredInjection> {
        if self.structured { Some(self) } else { None }
    }

    fn legacy(&self) -> Option<&dyn CodeInjection> {
        if self.legacy { Some(self) } else { None }
    }
}
