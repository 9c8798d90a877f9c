use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ai::client::{AgentClient, Reply};
use crate::approval::ApprovalQueue;
use crate::clock::{HardPauseGuard, SlowdownGuard, TimeService};
use crate::error::{LlmError, LlmResult};

/// How simulated time behaves while an NPC waits on the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Stop time entirely
    #[default]
    HardPause,
    /// Keep time moving at a reduced scale
    Slowdown,
    /// Leave the clock alone
    None,
}

/// Clock gate held for one think cycle
enum ClockHold {
    Paused(HardPauseGuard),
    Slowed(SlowdownGuard),
    Free,
}

/// Runs think cycles against any `AgentClient`
pub struct ThinkCycle {
    clock: Arc<TimeService>,
    approval: Option<Arc<ApprovalQueue>>,
    gate: GateMode,
}

impl ThinkCycle {
    pub fn new(clock: Arc<TimeService>) -> Self {
        Self {
            clock,
            approval: None,
            gate: GateMode::default(),
        }
    }

    /// Require a human decision before each call
    pub fn with_approval(mut self, queue: Arc<ApprovalQueue>) -> Self {
        self.approval = Some(queue);
        self
    }

    pub fn with_gate_mode(mut self, gate: GateMode) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate_mode(&self) -> GateMode {
        self.gate
    }

    fn hold(&self) -> ClockHold {
        match self.gate {
            GateMode::HardPause => ClockHold::Paused(self.clock.acquire_hard_pause()),
            GateMode::Slowdown => ClockHold::Slowed(self.clock.acquire_slowdown()),
            GateMode::None => ClockHold::Free,
        }
    }

    /// Approval, gate, send. The gate is released on every exit path.
    ///
    /// Cancelling drops the in-flight request; the client's history keeps
    /// whatever the loop had appended so far.
    pub async fn try_think<C, R>(&self, client: &mut C, cancel: &CancellationToken) -> LlmResult<R>
    where
        C: AgentClient,
        R: Reply + 'static,
    {
        let actor = client.identity().actor.clone();
        let agent_type = client.identity().agent_type.clone();

        if let Some(queue) = &self.approval {
            let approved = tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                approved = queue.request_approval(&actor, &agent_type, client.message_count()) => approved,
            };
            if !approved {
                return Err(LlmError::ApprovalRejected { actor, agent_type });
            }
        }

        let hold = self.hold();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = client.send::<R>() => result,
        };
        drop(hold);
        result
    }

    /// Like `try_think`, but a failure only skips this NPC's turn
    pub async fn think<C, R>(&self, client: &mut C, cancel: &CancellationToken) -> Option<R>
    where
        C: AgentClient,
        R: Reply + 'static,
    {
        match self.try_think(client, cancel).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                let identity = client.identity();
                match &e {
                    LlmError::Cancelled | LlmError::ApprovalRejected { .. } => info!(
                        actor = %identity.actor,
                        agent_type = %identity.agent_type,
                        "Think cycle skipped: {}", e
                    ),
                    _ => warn!(
                        actor = %identity.actor,
                        agent_type = %identity.agent_type,
                        code = e.code(),
                        "Think cycle failed, keeping previous plan: {}", e
                    ),
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::*;
    use crate::ai::client::{
        AgentClientConfig, Backend, BackendError, CallIdentity, DispatchRequest, ProviderAdapter,
        ResponsePolicy,
    };
    use crate::ai::providers::ProviderId;
    use crate::ai::retry::RetryPolicy;
    use crate::approval::{ApprovalPresenter, ApprovalRequest};
    use crate::clock::GameTime;

    /// Observes the clock at dispatch time
    struct ObservingBackend {
        clock: Arc<TimeService>,
        reply: Result<Value, BackendError>,
        hang: bool,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    #[async_trait]
    impl Backend for ObservingBackend {
        async fn dispatch(&self, _request: &DispatchRequest) -> Result<Value, BackendError> {
            self.seen
                .lock()
                .push((self.clock.hard_pause_count(), self.clock.slowdown_count()));
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.reply.clone()
        }
    }

    struct ShowAll;

    impl ApprovalPresenter for ShowAll {
        fn present(&self, _request: &ApprovalRequest) -> bool {
            true
        }
    }

    fn flowing_clock() -> Arc<TimeService> {
        let clock = TimeService::new(GameTime::default());
        clock.start_time_flow();
        clock
    }

    fn backend(clock: &Arc<TimeService>, reply: Result<Value, BackendError>, hang: bool) -> Arc<ObservingBackend> {
        Arc::new(ObservingBackend {
            clock: clock.clone(),
            reply,
            hang,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn ok_reply(text: &str) -> Result<Value, BackendError> {
        Ok(json!({"choices": [{"finish_reason": "stop", "message": {"content": text}}]}))
    }

    fn client(backend: Arc<ObservingBackend>) -> ProviderAdapter {
        let mut client = ProviderAdapter::new(
            AgentClientConfig::for_provider(ProviderId::OpenAi),
            backend,
            Arc::new(ResponsePolicy::new(RetryPolicy::immediate(1))),
        )
        .with_identity(CallIdentity::new("Mina", "planner", "run-1"));
        client.add_user_message("What now?");
        client
    }

    #[tokio::test]
    async fn test_pause_held_during_send_only() {
        let clock = flowing_clock();
        let backend = backend(&clock, ok_reply("Bake bread."), false);
        let mut client = client(backend.clone());
        let cycle = ThinkCycle::new(clock.clone());

        let reply: Option<String> = cycle.think(&mut client, &CancellationToken::new()).await;

        assert_eq!(reply.as_deref(), Some("Bake bread."));
        assert_eq!(*backend.seen.lock(), vec![(1, 0)]);
        assert!(clock.is_flowing());
        assert!(!clock.is_hard_paused());
    }

    #[tokio::test]
    async fn test_slowdown_mode() {
        let clock = flowing_clock();
        let backend = backend(&clock, ok_reply("ok"), false);
        let mut client = client(backend.clone());
        let cycle = ThinkCycle::new(clock.clone()).with_gate_mode(GateMode::Slowdown);
        assert_eq!(cycle.gate_mode(), GateMode::Slowdown);

        let _: Option<String> = cycle.think(&mut client, &CancellationToken::new()).await;

        assert_eq!(*backend.seen.lock(), vec![(0, 1)]);
        assert_eq!(clock.slowdown_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_skips_turn_and_restores_clock() {
        let clock = flowing_clock();
        let backend = backend(
            &clock,
            Err(BackendError::with_status(400, "invalid request")),
            false,
        );
        let mut client = client(backend);
        let cycle = ThinkCycle::new(clock.clone());

        let reply: Option<String> = cycle.think(&mut client, &CancellationToken::new()).await;

        assert!(reply.is_none());
        assert!(clock.is_flowing());
        assert_eq!(clock.hard_pause_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_dispatch_releases_gate() {
        let clock = flowing_clock();
        let backend = backend(&clock, ok_reply("never"), true);
        let mut client = client(backend.clone());
        let cycle = ThinkCycle::new(clock.clone());
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            async move {
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                cancel.cancel();
            }
        };
        let (result, _) = tokio::join!(cycle.try_think::<_, String>(&mut client, &cancel), canceller);

        assert!(matches!(result, Err(LlmError::Cancelled)));
        assert_eq!(backend.seen.lock().len(), 1);
        assert!(clock.is_flowing());
    }

    #[tokio::test]
    async fn test_rejected_approval_never_dispatches() {
        let clock = flowing_clock();
        let backend = backend(&clock, ok_reply("ok"), false);
        let mut client = client(backend.clone());
        let queue = Arc::new(ApprovalQueue::new(Some(clock.clone())));
        let cycle = ThinkCycle::new(clock.clone()).with_approval(queue);

        let result = cycle
            .try_think::<_, String>(&mut client, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(LlmError::ApprovalRejected { .. })));
        assert!(backend.seen.lock().is_empty());
        assert!(clock.is_flowing());
    }

    #[tokio::test]
    async fn test_approved_call_proceeds() {
        let clock = flowing_clock();
        let backend = backend(&clock, ok_reply("Approved plan."), false);
        let mut client = client(backend.clone());
        let queue = Arc::new(ApprovalQueue::new(Some(clock.clone())).with_presenter(Arc::new(ShowAll)));
        let cycle = ThinkCycle::new(clock.clone()).with_approval(queue.clone());

        let approver = async {
            while !queue.is_waiting_for_approval() {
                tokio::task::yield_now().await;
            }
            let request = queue.current_request().unwrap();
            assert_eq!(request.actor, "Mina");
            assert_eq!(request.message_count, 1);
            queue.approve_request(true);
        };
        let cancel = CancellationToken::new();
        let (reply, _) = tokio::join!(
            cycle.think::<_, String>(&mut client, &cancel),
            approver
        );

        assert_eq!(reply.as_deref(), Some("Approved plan."));
        // approval pause released before the gate pause was taken
        assert_eq!(*backend.seen.lock(), vec![(1, 0)]);
        assert!(clock.is_flowing());
    }
}
