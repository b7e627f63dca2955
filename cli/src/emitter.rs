use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;
use uascout_core::discovery::EventEmitter;

/// Writes every published message as one line of JSON.
pub struct JsonLinesEmitter {
    out: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    label: String,
}

impl JsonLinesEmitter {
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(tokio::io::stdout()), "stdout")
    }

    /// Appends to `path`, creating it if needed.
    pub async fn append(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::from_writer(Box::new(file), &path.display().to_string()))
    }

    pub async fn to(output: Option<&PathBuf>) -> anyhow::Result<Self> {
        match output {
            Some(path) => Self::append(path).await,
            None => Ok(Self::stdout()),
        }
    }

    fn from_writer(out: Box<dyn AsyncWrite + Send + Unpin>, label: &str) -> Self {
        Self {
            out: Mutex::new(out),
            label: label.to_string(),
        }
    }
}

#[async_trait]
impl EventEmitter for JsonLinesEmitter {
    async fn send(&self, messages: Vec<Vec<u8>>, content_type: &str) -> anyhow::Result<()> {
        let mut out = self.out.lock().await;
        for message in &messages {
            out.write_all(message).await?;
            out.write_all(b"\n").await?;
        }
        out.flush().await?;
        debug!("Wrote {} {content_type} records to {}", messages.len(), self.label);
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_one_line_per_message() {
        let path = std::env::temp_dir().join(format!("uascout-emitter-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let emitter = JsonLinesEmitter::append(&path).await.unwrap();
        emitter
            .send(vec![b"{\"index\":0}".to_vec(), b"{\"index\":1}".to_vec()], "application/json")
            .await
            .unwrap();
        emitter
            .send(vec![b"{\"index\":0}".to_vec()], "application/json")
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written, "{\"index\":0}\n{\"index\":1}\n{\"index\":0}\n");
    }
}
