//! # Controller: the single-threaded event loop.
//!
//! The controller is the authoritative owner of the labor registry and the
//! user handler. It processes one message at a time from a FIFO mailbox;
//! every mutation of the registry and every user callback happens inside
//! one such step, so no locks are needed for either.
//!
//! ## Suspension discipline
//! The controller never performs bulk I/O inline. Release delivery runs on
//! background load tasks that post [`Msg::Loaded`] back; best-effort
//! terminations of dropped labors run on background tasks too. The inline
//! adapter awaits (`spawn`, `terminate` for the API reply) are quick
//! control-plane calls by the adapter contract.
//!
//! ## Staleness discipline
//! The registry phase at the moment a message is processed is
//! authoritative. Timer fires additionally carry the epoch of the timer
//! that scheduled them; an epoch mismatch means the timer was cancelled or
//! replaced after the fire was enqueued, and the message is dropped.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::adapters::Adapter;
use crate::config::Config;
use crate::error::{LoadError, OverseerError};
use crate::events::{Bus, Event, EventKind};
use crate::handler::{CallFlow, Flow, Handler};
use crate::labor::{Labor, PairPid, Phase};
use crate::pair;
use crate::release::Release;
use crate::telemetry::Telemetry;
use crate::timer::TimerKind;

use super::overseer::Snapshot;
use super::registry::Registry;

/// Messages accepted by the controller mailbox.
pub(crate) enum Msg {
    // API calls.
    StartChild {
        reply: oneshot::Sender<Option<Labor>>,
    },
    TerminateChild {
        name: String,
        reply: oneshot::Sender<Result<Labor, OverseerError>>,
    },
    CountChildren {
        reply: oneshot::Sender<usize>,
    },
    Pair {
        name: String,
        pid: PairPid,
        reply: oneshot::Sender<Result<(), OverseerError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Call {
        request: Value,
        reply: oneshot::Sender<Value>,
    },
    Cast {
        message: Value,
    },
    Info {
        message: Value,
    },
    Shutdown {
        reply: Option<oneshot::Sender<()>>,
    },

    // Infrastructure events.
    NodeUp {
        name: String,
    },
    NodeDown {
        name: String,
    },
    EndpointExit {
        pid: PairPid,
        reason: String,
    },
    Telemetry(Telemetry),

    // Self-posted events.
    TimerFired {
        name: String,
        kind: TimerKind,
        epoch: u64,
    },
    LoadRelease {
        name: String,
    },
    Loaded {
        name: String,
        result: Result<(), LoadError>,
    },
}

/// Outcome of one controller step.
enum Step {
    Continue,
    Stop {
        reason: String,
        reply: Option<oneshot::Sender<()>>,
    },
}

/// Single-task event loop owning registry, handler, and adapter access.
pub(crate) struct Controller {
    cfg: Config,
    adapter: Arc<dyn Adapter>,
    release: Arc<Release>,
    handler: Box<dyn Handler>,
    registry: Registry,
    bus: Bus,
    tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
}

impl Controller {
    pub(crate) fn new(
        cfg: Config,
        adapter: Arc<dyn Adapter>,
        release: Arc<Release>,
        handler: Box<dyn Handler>,
        bus: Bus,
        tx: mpsc::UnboundedSender<Msg>,
        rx: mpsc::UnboundedReceiver<Msg>,
    ) -> Self {
        Self {
            cfg,
            adapter,
            release,
            handler,
            registry: Registry::new(),
            bus,
            tx,
            rx,
        }
    }

    /// Drives the mailbox until a stop is requested.
    pub(crate) async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match self.step(msg).await {
                Step::Continue => {}
                Step::Stop { reason, reply } => {
                    self.finish(&reason).await;
                    if let Some(reply) = reply {
                        let _ = reply.send(());
                    }
                    return;
                }
            }
        }
    }

    async fn step(&mut self, msg: Msg) -> Step {
        match msg {
            Msg::StartChild { reply } => self.on_start_child(reply).await,
            Msg::TerminateChild { name, reply } => self.on_terminate_child(name, reply).await,
            Msg::CountChildren { reply } => {
                let _ = reply.send(self.registry.count_active());
                Step::Continue
            }
            Msg::Pair { name, pid, reply } => self.on_pair(name, pid, reply).await,
            Msg::Snapshot { reply } => {
                let _ = reply.send(Snapshot {
                    overseer_id: self.cfg.overseer_id.clone(),
                    strategy: self.cfg.strategy,
                    max_nodes: self.cfg.max_nodes,
                    labors: self.registry.labors(),
                });
                Step::Continue
            }
            Msg::Call { request, reply } => match self.handler.handle_call(request).await {
                CallFlow::Reply(value) => {
                    let _ = reply.send(value);
                    Step::Continue
                }
                CallFlow::Stop { reason } => Step::Stop {
                    reason,
                    reply: None,
                },
            },
            Msg::Cast { message } => {
                let flow = self.handler.handle_cast(message).await;
                self.apply(flow).unwrap_or(Step::Continue)
            }
            Msg::Info { message } => {
                let flow = self.handler.handle_info(message).await;
                self.apply(flow).unwrap_or(Step::Continue)
            }
            Msg::Shutdown { reply } => Step::Stop {
                reason: "shutdown".to_string(),
                reply,
            },
            Msg::NodeUp { name } => self.on_node_up(name).await,
            Msg::NodeDown { name } => self.on_node_down(name).await,
            Msg::EndpointExit { pid, reason } => self.on_endpoint_exit(pid, reason).await,
            Msg::Telemetry(telemetry) => self.on_telemetry(telemetry).await,
            Msg::TimerFired { name, kind, epoch } => self.on_timer(name, kind, epoch).await,
            Msg::LoadRelease { name } => self.on_load_release(name).await,
            Msg::Loaded { name, result } => self.on_loaded(name, result).await,
        }
    }

    // ------------------------------------------------------------------
    // API calls
    // ------------------------------------------------------------------

    async fn on_start_child(&mut self, reply: oneshot::Sender<Option<Labor>>) -> Step {
        if self.registry.count_active() >= self.cfg.max_nodes {
            tracing::debug!(
                max_nodes = self.cfg.max_nodes,
                "start_child refused: pool at capacity"
            );
            let _ = reply.send(None);
            return self.emit_step(Event::now(EventKind::CapReached)).await;
        }

        match self.adapter.spawn(&self.cfg.overseer_id).await {
            Ok(mut labor) => {
                // Identity is known; the host may still be booting.
                labor.transition(Phase::Connecting);
                let name = labor.name.clone();
                self.registry.insert(labor.clone());
                self.arm_timer(&name, TimerKind::Conn);
                let _ = reply.send(Some(labor));
                self.emit_step(
                    Event::now(EventKind::LaborSpawned)
                        .with_labor(&name)
                        .with_phase(Phase::Connecting),
                )
                .await
            }
            Err(e) => {
                tracing::warn!(error = %e, "adapter spawn failed");
                let _ = reply.send(None);
                self.emit_step(Event::now(EventKind::SpawnFailed).with_error(e.to_string()))
                    .await
            }
        }
    }

    async fn on_terminate_child(
        &mut self,
        name: String,
        reply: oneshot::Sender<Result<Labor, OverseerError>>,
    ) -> Step {
        let labor = match self.registry.get_mut(&name) {
            Some(entry) => {
                entry.cancel_timers();
                entry.labor.clone()
            }
            None => {
                let _ = reply.send(Err(OverseerError::UnknownLabor { name }));
                return Step::Continue;
            }
        };

        match self.adapter.terminate(&labor).await {
            Ok(mut terminated) => {
                terminated.pair_pid = None;
                if terminated.phase != Phase::Terminated {
                    terminated.transition(Phase::Terminated);
                }
                if let Some(entry) = self.registry.get_mut(&name) {
                    entry.labor = terminated.clone();
                }
                let _ = reply.send(Ok(terminated));
                self.emit_step(
                    Event::now(EventKind::LaborTerminated)
                        .with_labor(&name)
                        .with_phase(Phase::Terminated),
                )
                .await
            }
            Err(e) => {
                tracing::warn!(labor = %name, error = %e, "adapter terminate failed");
                let _ = reply.send(Err(e.into()));
                Step::Continue
            }
        }
    }

    async fn on_pair(
        &mut self,
        name: String,
        pid: PairPid,
        reply: oneshot::Sender<Result<(), OverseerError>>,
    ) -> Step {
        match self.registry.get_mut(&name) {
            Some(entry) if entry.labor.phase.is_live() => {
                entry.pair.cancel();
                entry.labor.pair_pid = Some(pid);
                entry.labor.transition(Phase::Active);
                entry.reset_retries();
                let _ = reply.send(Ok(()));
                self.emit_step(
                    Event::now(EventKind::Paired)
                        .with_labor(&name)
                        .with_phase(Phase::Active),
                )
                .await
            }
            _ => {
                let _ = reply.send(Err(OverseerError::UnknownLabor { name }));
                Step::Continue
            }
        }
    }

    // ------------------------------------------------------------------
    // Infrastructure events
    // ------------------------------------------------------------------

    async fn on_node_up(&mut self, name: String) -> Step {
        let Some(entry) = self.registry.get_mut(&name) else {
            tracing::debug!(labor = %name, "node_up for unknown worker, dropped");
            return self
                .emit_step(
                    Event::now(EventKind::UnknownNode)
                        .with_labor(&name)
                        .with_error("node_up"),
                )
                .await;
        };

        match entry.labor.phase {
            Phase::Spawning | Phase::Connecting | Phase::Disconnected => {
                entry.conn.cancel();
                entry.labor.transition(Phase::Loading);
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::NodeUp)
                            .with_labor(&name)
                            .with_phase(Phase::Loading),
                    )
                    .await
                {
                    return step;
                }
                let flow = self.handler.handle_connected(&name).await;
                if let Some(step) = self.apply(flow) {
                    return step;
                }
                let _ = self.tx.send(Msg::LoadRelease { name });
                Step::Continue
            }
            // Repeated node_up without an intervening node_down.
            _ => Step::Continue,
        }
    }

    async fn on_node_down(&mut self, name: String) -> Step {
        let Some(entry) = self.registry.get_mut(&name) else {
            tracing::debug!(labor = %name, "node_down for unknown worker, dropped");
            return self
                .emit_step(
                    Event::now(EventKind::UnknownNode)
                        .with_labor(&name)
                        .with_error("node_down"),
                )
                .await;
        };

        if entry.labor.phase == Phase::Terminated {
            // The final node_down of a terminated labor: emit and forget.
            self.registry.remove(&name);
            let flow = self.handler.handle_terminated(&name).await;
            if let Some(step) = self.apply(flow) {
                return step;
            }
            return self
                .emit_step(
                    Event::now(EventKind::LaborDropped)
                        .with_labor(&name)
                        .with_phase(Phase::Terminated),
                )
                .await;
        }

        entry.pair.cancel();
        entry.labor.pair_pid = None;
        entry.labor.transition(Phase::Disconnected);
        self.arm_timer(&name, TimerKind::Conn);
        if let Some(step) = self
            .emit(
                Event::now(EventKind::NodeDown)
                    .with_labor(&name)
                    .with_phase(Phase::Disconnected),
            )
            .await
        {
            return step;
        }
        let flow = self.handler.handle_disconnected(&name).await;
        self.apply(flow).unwrap_or(Step::Continue)
    }

    async fn on_endpoint_exit(&mut self, pid: PairPid, reason: String) -> Step {
        let name = pid.node.clone();
        let Some(entry) = self.registry.get_mut(&name) else {
            tracing::debug!(labor = %name, "exit for unknown worker, dropped");
            return self
                .emit_step(
                    Event::now(EventKind::UnknownNode)
                        .with_labor(&name)
                        .with_error("exit"),
                )
                .await;
        };

        if entry.labor.pair_pid.as_ref() != Some(&pid) {
            // Exit of an endpoint that has already been replaced.
            return Step::Continue;
        }
        entry.labor.pair_pid = None;

        match entry.labor.phase {
            Phase::Active | Phase::Pairing => {
                entry.labor.transition(Phase::Loading);
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::EndpointExit)
                            .with_labor(&name)
                            .with_phase(Phase::Loading)
                            .with_error(reason),
                    )
                    .await
                {
                    return step;
                }
                let _ = self.tx.send(Msg::LoadRelease { name });
                Step::Continue
            }
            _ => Step::Continue,
        }
    }

    async fn on_telemetry(&mut self, telemetry: Telemetry) -> Step {
        if self.registry.get(&telemetry.name).is_none() {
            tracing::debug!(labor = %telemetry.name, "telemetry from unknown worker, dropped");
            return Step::Continue;
        }
        if let Some(step) = self
            .emit(Event::now(EventKind::TelemetryReceived).with_labor(&telemetry.name))
            .await
        {
            return step;
        }
        let flow = self.handler.handle_telemetry(&telemetry).await;
        self.apply(flow).unwrap_or(Step::Continue)
    }

    // ------------------------------------------------------------------
    // Timers and release delivery
    // ------------------------------------------------------------------

    async fn on_timer(&mut self, name: String, kind: TimerKind, epoch: u64) -> Step {
        let phase = {
            let Some(entry) = self.registry.get_mut(&name) else {
                return Step::Continue;
            };
            let slot = match kind {
                TimerKind::Conn => &mut entry.conn,
                TimerKind::Pair => &mut entry.pair,
            };
            if !slot.accepts(epoch) {
                return Step::Continue;
            }
            slot.disarm();
            entry.labor.phase
        };

        match (kind, phase) {
            // Never came up: silent drop, no disconnect/terminate callback.
            (TimerKind::Conn, Phase::Spawning | Phase::Connecting) => {
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::ConnTimeout)
                            .with_labor(&name)
                            .with_phase(phase),
                    )
                    .await
                {
                    return step;
                }
                self.drop_labor(&name, false).await
            }
            // Reconnect window expired.
            (TimerKind::Conn, Phase::Disconnected) => {
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::ConnTimeout)
                            .with_labor(&name)
                            .with_phase(phase),
                    )
                    .await
                {
                    return step;
                }
                self.drop_labor(&name, true).await
            }
            (TimerKind::Pair, Phase::Loading | Phase::Pairing) => {
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::PairTimeout)
                            .with_labor(&name)
                            .with_phase(phase),
                    )
                    .await
                {
                    return step;
                }
                self.retry_or_drop(&name).await
            }
            // Phase has advanced past the timer's precondition.
            _ => Step::Continue,
        }
    }

    async fn on_load_release(&mut self, name: String) -> Step {
        let labor = {
            let Some(entry) = self.registry.get_mut(&name) else {
                return Step::Continue;
            };
            if entry.labor.phase != Phase::Loading {
                return Step::Continue;
            }
            entry.labor.clone()
        };

        self.arm_timer(&name, TimerKind::Pair);
        if let Some(step) = self
            .emit(
                Event::now(EventKind::ReleaseLoading)
                    .with_labor(&name)
                    .with_phase(Phase::Loading),
            )
            .await
        {
            return step;
        }

        let adapter = Arc::clone(&self.adapter);
        let release = Arc::clone(&self.release);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = pair::load_release(adapter, release, labor).await;
            let _ = tx.send(Msg::Loaded { name, result });
        });
        Step::Continue
    }

    async fn on_loaded(&mut self, name: String, result: Result<(), LoadError>) -> Step {
        let in_loading = self
            .registry
            .get(&name)
            .map(|entry| entry.labor.phase == Phase::Loading)
            .unwrap_or(false);
        if !in_loading {
            return Step::Continue;
        }

        match result {
            Ok(()) => {
                if let Some(entry) = self.registry.get_mut(&name) {
                    entry.labor.transition(Phase::Pairing);
                }
                self.emit_step(
                    Event::now(EventKind::ReleaseLoaded)
                        .with_labor(&name)
                        .with_phase(Phase::Pairing),
                )
                .await
            }
            Err(e) => {
                tracing::warn!(labor = %name, error = %e, "release load failed");
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::LoadFailed)
                            .with_labor(&name)
                            .with_error(e.to_string()),
                    )
                    .await
                {
                    return step;
                }
                self.retry_or_drop(&name).await
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Arms the labor's timer of `kind`, replacing any armed one.
    fn arm_timer(&mut self, name: &str, kind: TimerKind) {
        let after = match kind {
            TimerKind::Conn => self.cfg.conn_timeout,
            TimerKind::Pair => self.cfg.pair_timeout,
        };
        let Some(entry) = self.registry.get_mut(name) else {
            return;
        };
        let slot = match kind {
            TimerKind::Conn => &mut entry.conn,
            TimerKind::Pair => &mut entry.pair,
        };
        let tx = self.tx.clone();
        let owned = name.to_string();
        slot.arm(after, move |epoch| async move {
            let _ = tx.send(Msg::TimerFired {
                name: owned,
                kind,
                epoch,
            });
        });
    }

    /// Removes the labor, terminating its resources in the background.
    ///
    /// `notify` decides whether the departure is surfaced through
    /// `handle_terminated`; workers that never connected are dropped
    /// silently.
    async fn drop_labor(&mut self, name: &str, notify: bool) -> Step {
        if let Some(entry) = self.registry.remove(name) {
            if entry.labor.phase.is_live() {
                let adapter = Arc::clone(&self.adapter);
                let labor = entry.labor.clone();
                tokio::spawn(async move {
                    if let Err(e) = adapter.terminate(&labor).await {
                        tracing::warn!(labor = %labor.name, error = %e, "background terminate failed");
                    }
                });
            }
        }
        if notify {
            let flow = self.handler.handle_terminated(name).await;
            if let Some(step) = self.apply(flow) {
                return step;
            }
        }
        self.emit_step(Event::now(EventKind::LaborDropped).with_labor(name))
            .await
    }

    /// Books another delivery attempt, or gives the labor up once the
    /// retry budget is spent.
    async fn retry_or_drop(&mut self, name: &str) -> Step {
        let scheduled = {
            let Some(entry) = self.registry.get_mut(name) else {
                return Step::Continue;
            };
            entry.load_attempts += 1;
            if entry.load_attempts > self.cfg.load_retries {
                None
            } else {
                let delay = self.cfg.load_backoff.next(entry.prev_delay);
                entry.prev_delay = Some(delay);
                Some((entry.load_attempts, delay))
            }
        };

        match scheduled {
            Some((attempt, delay)) => {
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::RetryScheduled)
                            .with_labor(name)
                            .with_attempt(attempt)
                            .with_delay(delay),
                    )
                    .await
                {
                    return step;
                }
                let tx = self.tx.clone();
                let owned = name.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Msg::LoadRelease { name: owned });
                });
                Step::Continue
            }
            None => {
                if let Some(step) = self
                    .emit(
                        Event::now(EventKind::LoadFailed)
                            .with_labor(name)
                            .with_error("load retries exhausted"),
                    )
                    .await
                {
                    return step;
                }
                self.drop_labor(name, true).await
            }
        }
    }

    /// Publishes to the bus and runs the generic `handle_event` hook.
    async fn emit(&mut self, event: Event) -> Option<Step> {
        self.bus.publish(event.clone());
        let flow = self.handler.handle_event(&event).await;
        self.apply(flow)
    }

    /// Like [`emit`](Self::emit), collapsing the outcome into a [`Step`].
    async fn emit_step(&mut self, event: Event) -> Step {
        self.emit(event).await.unwrap_or(Step::Continue)
    }

    /// Applies a callback's [`Flow`] to the loop.
    fn apply(&mut self, flow: Flow) -> Option<Step> {
        match flow {
            Flow::Noreply => None,
            Flow::NoreplyHibernate => {
                self.registry.shrink();
                None
            }
            Flow::Stop { reason } => Some(Step::Stop {
                reason,
                reply: None,
            }),
        }
    }

    /// Shutdown sequence: cancel timers, terminate live labors best-effort,
    /// run the user's `terminate`.
    async fn finish(&mut self, reason: &str) {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));
        for entry in self.registry.drain() {
            if entry.labor.phase.is_live() {
                if let Err(e) = self.adapter.terminate(&entry.labor).await {
                    tracing::warn!(
                        labor = %entry.labor.name,
                        error = %e,
                        "terminate during shutdown failed"
                    );
                }
            }
        }
        self.handler.terminate(reason).await;
        self.bus.publish(Event::now(EventKind::OverseerStopped));
    }
}
