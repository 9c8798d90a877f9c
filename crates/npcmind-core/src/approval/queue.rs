use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{ApprovalPresenter, ApprovalRequest};
use crate::clock::{HardPauseGuard, TimeService};

struct Pending {
    request: ApprovalRequest,
    reply: oneshot::Sender<bool>,
}

/// The request on screen and the pause it holds
struct Current {
    pending: Pending,
    _pause: Option<HardPauseGuard>,
}

#[derive(Default)]
struct QueueState {
    queued: VecDeque<Pending>,
    current: Option<Current>,
}

/// FIFO approval queue shared by every thinking NPC
pub struct ApprovalQueue {
    state: Mutex<QueueState>,
    clock: Option<Arc<TimeService>>,
    presenter: RwLock<Option<Arc<dyn ApprovalPresenter>>>,
}

impl ApprovalQueue {
    /// Queue that pauses `clock` while a request is shown
    pub fn new(clock: Option<Arc<TimeService>>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            clock,
            presenter: RwLock::new(None),
        }
    }

    pub fn with_presenter(self, presenter: Arc<dyn ApprovalPresenter>) -> Self {
        self.set_presenter(Some(presenter));
        self
    }

    /// Attach or detach the UI. Without one every request is rejected.
    pub fn set_presenter(&self, presenter: Option<Arc<dyn ApprovalPresenter>>) {
        *self.presenter.write() = presenter;
    }

    /// Wait for a human decision about sending `message_count` messages
    pub async fn request_approval(&self, actor: &str, agent_type: &str, message_count: usize) -> bool {
        let request = ApprovalRequest::new(actor, agent_type, message_count);
        let (reply, decision) = oneshot::channel();
        let queued = {
            let mut state = self.state.lock();
            state.queued.push_back(Pending {
                request: request.clone(),
                reply,
            });
            state.queued.len()
        };
        info!(actor, agent_type, queued, "Approval requested");

        self.advance();

        let approved = decision.await.unwrap_or(false);
        info!(actor, agent_type, approved, "Approval decided");
        approved
    }

    /// Decide the current request. Returns `false` when nothing is waiting.
    pub fn approve_request(&self, approved: bool) -> bool {
        let finished = self.state.lock().current.take();
        let Some(finished) = finished else {
            warn!("No approval request is waiting");
            return false;
        };

        let Current {
            pending,
            _pause: pause,
        } = finished;

        debug!(
            actor = %pending.request.actor,
            approved,
            "Resolving approval request"
        );
        if pending.reply.send(approved).is_err() {
            debug!("Approval requester is gone");
        }

        self.advance();
        if !self.is_waiting_for_approval() {
            if let Some(presenter) = self.presenter.read().clone() {
                presenter.dismiss();
            }
        }
        // The next request (if any) already holds its own pause
        drop(pause);
        true
    }

    pub fn is_waiting_for_approval(&self) -> bool {
        self.state.lock().current.is_some()
    }

    pub fn current_request(&self) -> Option<ApprovalRequest> {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|c| c.pending.request.clone())
    }

    /// Requests not yet decided, including the one on screen
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock();
        state.queued.len() + usize::from(state.current.is_some())
    }

    /// Present the next queued request if nothing is on screen
    fn advance(&self) {
        loop {
            let request = {
                let mut state = self.state.lock();
                if state.current.is_some() {
                    return;
                }
                let pending = loop {
                    let Some(pending) = state.queued.pop_front() else {
                        return;
                    };
                    // Requester cancelled while queued
                    if pending.reply.is_closed() {
                        debug!(actor = %pending.request.actor, "Dropping abandoned approval request");
                        continue;
                    }
                    break pending;
                };
                let request = pending.request.clone();
                let pause = self.clock.as_ref().map(|clock| clock.acquire_hard_pause());
                state.current = Some(Current {
                    pending,
                    _pause: pause,
                });
                request
            };

            let presenter = self.presenter.read().clone();
            if presenter.is_some_and(|p| p.present(&request)) {
                debug!(actor = %request.actor, id = %request.request_id, "Approval presented");
                return;
            }

            error!(
                actor = %request.actor,
                agent_type = %request.agent_type,
                "No approval surface available, rejecting request"
            );
            let rejected = {
                let mut state = self.state.lock();
                match &state.current {
                    Some(c) if c.pending.request.request_id == request.request_id => {
                        state.current.take()
                    }
                    _ => None,
                }
            };
            if let Some(rejected) = rejected {
                let _ = rejected.pending.reply.send(false);
            }
        }
    }
}

impl Default for ApprovalQueue {
    fn default() -> Self {
        Self::new(None)
    }
}
