//! Per-widget refresh scheduling
//!
//! Every widget gets its own timer task. A tick (or a manual trigger) starts a fetch
//! cycle only when the widget has no cycle in flight; otherwise it is skipped, never
//! queued. A cycle runs fetch, then filter, stores the result on the instance and
//! sends the widget index on the render channel.
//!
//! Fetches that overrun their deadline are abandoned: the widget shows a timeout error,
//! the eventual result is thrown away, and the in-flight slot is released only when the
//! call actually returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::widget::{FetchError, WidgetInstance};

/// Delay between the first fetches of consecutive widgets
pub const STAGGER_STEP: Duration = Duration::from_millis(250);

/// Extra time a fetch gets past its own timeout before it is abandoned
pub const ABANDON_GRACE: Duration = Duration::from_secs(1);

/// Outcome of asking a widget to refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Started,
    /// A cycle for this widget is still running
    Skipped,
}

/// Everything a fetch cycle needs besides the instance
#[derive(Clone)]
struct CycleContext {
    fetch_timeout: Duration,
    abandon_after: Duration,
    render_tx: mpsc::UnboundedSender<usize>,
    shutdown: watch::Receiver<bool>,
}

pub struct Scheduler {
    instances: Vec<Arc<WidgetInstance>>,
    ctx: CycleContext,
    stagger: Duration,
    shutdown_tx: watch::Sender<bool>,
    timers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler. Nothing runs until `start`.
    pub fn new(
        instances: Vec<Arc<WidgetInstance>>,
        fetch_timeout: Duration,
        render_tx: mpsc::UnboundedSender<usize>,
    ) -> Self {
        let (shutdown_tx, shutdown) = watch::channel(false);
        Self {
            instances,
            ctx: CycleContext {
                fetch_timeout,
                abandon_after: fetch_timeout + ABANDON_GRACE,
                render_tx,
                shutdown,
            },
            stagger: STAGGER_STEP,
            shutdown_tx,
            timers: Vec::new(),
        }
    }

    /// Override how long past `fetch_timeout` a fetch may run before it is abandoned
    pub fn with_abandon_grace(mut self, grace: Duration) -> Self {
        self.ctx.abandon_after = self.ctx.fetch_timeout + grace;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn instances(&self) -> &[Arc<WidgetInstance>] {
        &self.instances
    }

    /// Spawn one timer per widget
    pub fn start(&mut self) {
        if !self.timers.is_empty() {
            return;
        }

        for instance in &self.instances {
            let interval = instance.config().refresh_interval;
            let delay = (self.stagger * instance.index() as u32).min(interval);
            info!(
                "SCHED: '{}' every {:?}, first fetch in {:?}",
                instance.name(),
                interval,
                delay
            );

            let instance = Arc::clone(instance);
            let ctx = self.ctx.clone();
            self.timers.push(tokio::spawn(async move {
                run_timer(instance, ctx, delay).await;
            }));
        }
    }

    /// Ask one widget to refresh now. `None` if there is no widget at `index`.
    pub fn trigger(&self, index: usize) -> Option<Trigger> {
        let instance = self.instances.get(index)?;
        Some(start_cycle(instance, &self.ctx))
    }

    pub fn trigger_all(&self) {
        for instance in &self.instances {
            start_cycle(instance, &self.ctx);
        }
    }

    /// Stop all timers and cancel in-flight fetches
    pub async fn shutdown(self) {
        info!("SCHED: shutting down {} timer(s)", self.timers.len());
        let _ = self.shutdown_tx.send(true);
        for timer in self.timers {
            let _ = timer.await;
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn run_timer(instance: Arc<WidgetInstance>, ctx: CycleContext, delay: Duration) {
    let mut shutdown = ctx.shutdown.clone();

    tokio::select! {
        _ = sleep(delay) => {}
        _ = shutdown_requested(&mut shutdown) => return,
    }

    let mut ticker = tokio::time::interval(instance.config().refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if start_cycle(&instance, &ctx) == Trigger::Skipped {
                    debug!("SCHED: '{}' still fetching, tick skipped", instance.name());
                }
            }
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }
    trace!("SCHED: '{}' timer stopped", instance.name());
}

fn start_cycle(instance: &Arc<WidgetInstance>, ctx: &CycleContext) -> Trigger {
    if !instance.try_begin_fetch() {
        return Trigger::Skipped;
    }

    let instance = Arc::clone(instance);
    let ctx = ctx.clone();
    tokio::spawn(async move {
        run_cycle(&instance, ctx).await;
        instance.end_fetch();
    });
    Trigger::Started
}

async fn run_cycle(instance: &Arc<WidgetInstance>, ctx: CycleContext) {
    let mut shutdown = ctx.shutdown.clone();
    let timeout = ctx.fetch_timeout;

    let fetching = Arc::clone(instance);
    let mut fetch = tokio::spawn(async move { fetching.widget().fetch(timeout).await });

    let joined = tokio::select! {
        joined = &mut fetch => Some(joined),
        _ = sleep(ctx.abandon_after) => None,
        _ = shutdown_requested(&mut shutdown) => {
            fetch.abort();
            return;
        }
    };

    match joined {
        Some(Ok(Ok(raw))) => {
            let statuses = instance.widget().filter(raw);
            instance.record_success(statuses);
        }
        Some(Ok(Err(e))) => {
            warn!("FETCH: '{}' failed: {}", instance.name(), e);
            instance.record_failure(e);
        }
        Some(Err(join_error)) => {
            warn!("FETCH: '{}' task died: {}", instance.name(), join_error);
            instance.record_failure(FetchError::Task(join_error.to_string()));
        }
        None => {
            warn!(
                "FETCH: '{}' ignored its {:?} timeout, abandoning",
                instance.name(),
                timeout
            );
            instance.record_failure(FetchError::Timeout(timeout));
            let _ = ctx.render_tx.send(instance.index());

            // Hold the in-flight slot until the abandoned call returns; its result is discarded
            tokio::select! {
                _ = &mut fetch => {
                    debug!("FETCH: '{}' abandoned call finished, result discarded", instance.name());
                }
                _ = shutdown_requested(&mut shutdown) => fetch.abort(),
            }
            return;
        }
    }

    let _ = ctx.render_tx.send(instance.index());
}
