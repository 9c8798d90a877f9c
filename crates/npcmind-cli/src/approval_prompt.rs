//! Terminal approval surface
//!
//! Prints each request and reads `y`/`n` from stdin on a background thread,
//! then resolves the request on the queue.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Weak};

use npcmind_core::approval::{ApprovalPresenter, ApprovalQueue, ApprovalRequest};

pub struct StdinApproval {
    queue: Weak<ApprovalQueue>,
}

impl StdinApproval {
    /// Attach a terminal prompt to `queue`
    pub fn install(queue: &Arc<ApprovalQueue>) {
        let presenter = Arc::new(Self {
            queue: Arc::downgrade(queue),
        });
        queue.set_presenter(Some(presenter));
    }
}

impl ApprovalPresenter for StdinApproval {
    fn present(&self, request: &ApprovalRequest) -> bool {
        let queue = self.queue.clone();
        let prompt = format!(
            "Approve model call for {} ({}), {} message(s)? [y/N] ",
            request.actor, request.agent_type, request.message_count
        );

        std::thread::spawn(move || {
            let mut stdout = io::stdout();
            let _ = write!(stdout, "{}", prompt);
            let _ = stdout.flush();

            let mut line = String::new();
            let approved = match io::stdin().lock().read_line(&mut line) {
                Ok(_) => is_yes(&line),
                Err(e) => {
                    tracing::warn!("Failed to read approval answer: {}", e);
                    false
                }
            };
            if let Some(queue) = queue.upgrade() {
                queue.approve_request(approved);
            }
        });
        true
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("nope"));
    }
}
