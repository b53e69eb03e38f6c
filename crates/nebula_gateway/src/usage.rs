//! Usage accounting to a CSV flat file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::warn;
use tokio::sync::Mutex;

const USAGE_HEADER: &str = "timestamp,session_id,input_chars,output_chars,total_chars";

/// Appends one row per completed turn. Failures are logged and never fail
/// the request that produced them.
#[derive(Debug, Clone)]
pub struct UsageLog {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl UsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub async fn record(&self, session_id: &str, input: &str, output: &str) {
        let _guard = self.guard.lock().await;
        if let Err(err) = self.append_row(session_id, input.chars().count(), output.chars().count())
        {
            warn!("failed to record usage for session {session_id}: {err}");
        }
    }

    fn append_row(
        &self,
        session_id: &str,
        input_chars: usize,
        output_chars: usize,
    ) -> std::io::Result<()> {
        let new_file = !self.path.exists();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if new_file {
            writeln!(file, "{USAGE_HEADER}")?;
        }
        writeln!(
            file,
            "{},{},{},{},{}",
            Utc::now().to_rfc3339(),
            session_id,
            input_chars,
            output_chars,
            input_chars + output_chars
        )
    }
}
