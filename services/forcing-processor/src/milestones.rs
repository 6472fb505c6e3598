//! Plain-text milestone log (`log_fp.txt`), written only when `run.verbose`
//! is set, mirroring the upstream tool's coarse phase timestamps.
//!
//! This is presentation, not a tested property: nothing in this crate
//! asserts on its content.

use chrono::Local;

use forcing_core::Result;
use nwm_store::ObjectStoreAdapter;

pub struct MilestoneLog {
    enabled: bool,
    lines: Vec<String>,
}

impl MilestoneLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    pub fn mark(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        self.lines.push(format!("{name} {now}"));
    }

    pub async fn flush(&self, store: &ObjectStoreAdapter, output_path: &str) -> Result<()> {
        if !self.enabled || self.lines.is_empty() {
            return Ok(());
        }
        let uri = format!("{}/log_fp.txt", output_path.trim_end_matches('/'));
        let body = format!("{}\n", self.lines.join("\n"));
        store.put(&uri, bytes::Bytes::from(body)).await
    }
}
