//! Human-readable conversation logs
//!
//! Layout: `{root}/{yyyy-MM-dd}/{session}/{actor}/ConversationLog_{session}_{actor}_{HH-mm-ss}_{agent}.txt`.
//! Outgoing request and raw-response logs land next to them with an
//! `OutgoingRequestLog_` prefix. Files are opened in append mode.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ai::client::{CallIdentity, ConversationSink, Transcript, TranscriptOutcome};
use crate::ai::providers::ProviderId;
use crate::clock::TimeService;
use crate::paths;

const RULE: &str = "=====================================";

/// File-backed `ConversationSink`
pub struct ConversationLog {
    root: PathBuf,
    clock: Option<Arc<TimeService>>,
}

impl ConversationLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: None,
        }
    }

    /// Logs under the data directory
    pub fn open_default() -> Self {
        Self::new(paths::conversation_logs_dir())
    }

    /// Stamp entries with simulated time
    pub fn with_clock(mut self, clock: Arc<TimeService>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn actor_dir(&self, identity: &CallIdentity, now: &DateTime<Local>) -> PathBuf {
        self.root
            .join(now.format("%Y-%m-%d").to_string())
            .join(&identity.session)
            .join(&identity.actor)
    }

    fn file_path(&self, prefix: &str, identity: &CallIdentity, now: &DateTime<Local>) -> PathBuf {
        let name = format!(
            "{}_{}_{}_{}_{}.txt",
            prefix,
            identity.session,
            identity.actor,
            now.format("%H-%M-%S"),
            identity.agent_type
        );
        self.actor_dir(identity, now).join(name)
    }

    fn game_time(&self) -> String {
        self.clock
            .as_ref()
            .map(|c| c.current_time().to_string())
            .unwrap_or_else(|| "n/a".to_string())
    }

    /// Render one finished conversation
    pub fn render(&self, transcript: &Transcript<'_>, now: &DateTime<Local>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== {} Conversation Log ===", transcript.provider);
        let _ = writeln!(out, "Actor: {}", transcript.identity.actor);
        let _ = writeln!(out, "Agent Type: {}", transcript.identity.agent_type);
        let _ = writeln!(out, "Model: {}", transcript.model);
        let _ = writeln!(out, "Game Time: {}", self.game_time());
        let _ = writeln!(out, "Real Time: {}", now.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}", RULE);
        out.push('\n');

        for message in transcript.messages {
            let _ = writeln!(out, "--- {} ---", message.role);
            let _ = writeln!(out, "{}", message.render());
            out.push('\n');
        }

        match &transcript.outcome {
            TranscriptOutcome::Final(text) if !text.is_empty() => {
                let _ = writeln!(out, "--- Final Response ---");
                let _ = writeln!(out, "{}", text);
                out.push('\n');
            }
            TranscriptOutcome::Final(_) => {}
            TranscriptOutcome::Error { kind, message } => {
                let _ = writeln!(out, "ERROR({}): {}", kind, message);
                out.push('\n');
            }
        }

        out.push_str("=== End of Conversation ===\n");
        out
    }

    fn append(path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(file, "{}", contents)?;
        Ok(())
    }

    fn append_outgoing(&self, identity: &CallIdentity, header: &str, provider: ProviderId, body: &Value) {
        let now = Local::now();
        let path = self.file_path("OutgoingRequestLog", identity, &now);
        let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
        let contents = format!(
            "=== {} ===\nProvider: {}\nActor: {}\nAgent Type: {}\nReal Time: {}\n{}\n",
            header,
            provider,
            identity.actor,
            identity.agent_type,
            now.format("%Y-%m-%d %H:%M:%S"),
            pretty
        );
        if let Err(e) = Self::append(&path, &contents) {
            warn!(actor = %identity.actor, "Failed to write outgoing log: {:#}", e);
        }
    }
}

impl ConversationSink for ConversationLog {
    fn record(&self, transcript: &Transcript<'_>) -> Result<()> {
        if transcript.identity.actor == CallIdentity::default().actor {
            warn!(
                agent_type = %transcript.identity.agent_type,
                "Saving conversation log for an unnamed actor"
            );
        }
        let now = Local::now();
        let path = self.file_path("ConversationLog", transcript.identity, &now);
        Self::append(&path, &self.render(transcript, &now))?;
        debug!(path = %path.display(), "Conversation log saved");
        Ok(())
    }

    fn log_request(&self, identity: &CallIdentity, provider: ProviderId, body: &Value) {
        self.append_outgoing(identity, "Outgoing Request", provider, body);
    }

    fn log_raw_response(&self, identity: &CallIdentity, provider: ProviderId, raw: &Value) {
        self.append_outgoing(identity, "Raw Model Response (pre-parse)", provider, raw);
    }
}
