//! Opening bug forms in the operator's browser

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::traits::BugViewer;

/// Hands URLs to an external program (`xdg-open` by default).
///
/// The program is only spawned; its exit status is not waited for since
/// browsers commonly keep running.
#[derive(Debug, Clone)]
pub struct CommandViewer {
    pub program: String,
}

impl Default for CommandViewer {
    fn default() -> Self {
        CommandViewer {
            program: "xdg-open".to_string(),
        }
    }
}

impl CommandViewer {
    pub fn new(program: &str) -> Self {
        CommandViewer {
            program: program.to_string(),
        }
    }
}

#[async_trait]
impl BugViewer for CommandViewer {
    async fn open(&self, url: &str) -> ClientResult<()> {
        debug!(program = %self.program, url, "opening viewer");
        Command::new(&self.program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClientError::Viewer {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
