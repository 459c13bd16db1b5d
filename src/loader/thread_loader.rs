use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::app::{Result, WatchError};
use crate::domain::{Loadable, PostIndex, ThreadSnapshot, ViewCursor};
use crate::fetcher::{HttpTransport, TransportError};
use crate::loader::coordinator::{Completion, FetchCoordinator};
use crate::loader::scheduler::{BackoffLadder, PollScheduler};
use crate::loader::{reconcile, LoaderError, LoaderEvent, LoaderStatus};
use crate::site::actions::execute;
use crate::site::{ParsedBatch, SiteAdapter};

type FetchResult = std::result::Result<ParsedBatch, LoaderError>;

/// A subscriber's end of a loader.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::UnboundedReceiver<LoaderEvent>,
}

enum Command {
    Subscribe(oneshot::Sender<Subscription>),
    Unsubscribe(u64, oneshot::Sender<bool>),
    Start,
    RequestMore(oneshot::Sender<bool>),
    RequestMoreAndResetTimer,
    LoadMoreIfTime,
    QuickLoad(oneshot::Sender<bool>),
    Pause,
    Status(oneshot::Sender<LoaderStatus>),
    Snapshot(oneshot::Sender<Option<Arc<ThreadSnapshot>>>),
    SetCursor(ViewCursor),
    Loadable(oneshot::Sender<Loadable>),
    Shutdown,
}

/// Handle to the task loading one thread or catalog.
///
/// Cloning the handle is cheap; the task stops on [`ThreadLoader::shutdown`]
/// or once every handle is dropped.
#[derive(Clone)]
pub struct ThreadLoader {
    loadable: Loadable,
    commands: mpsc::UnboundedSender<Command>,
}

impl ThreadLoader {
    pub fn spawn(
        loadable: Loadable,
        site: Arc<dyn SiteAdapter>,
        transport: Arc<dyn HttpTransport>,
        ladder: BackoffLadder,
    ) -> Self {
        let (commands, inbox) = mpsc::unbounded_channel();
        let (coordinator, completions) = FetchCoordinator::new();

        let actor = LoaderActor {
            scheduler: PollScheduler::new(ladder, loadable.is_thread()),
            loadable: loadable.clone(),
            site,
            transport,
            coordinator,
            snapshot: None,
            subscribers: Vec::new(),
            next_subscriber: 0,
        };
        tokio::spawn(actor.run(inbox, completions));

        Self { loadable, commands }
    }

    /// Identity of the loaded resource. See [`ThreadLoader::loadable`] for
    /// the live cursor.
    pub fn id(&self) -> &Loadable {
        &self.loadable
    }

    /// True once the loader task has exited.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| WatchError::LoaderClosed)
    }

    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| WatchError::LoaderClosed)
    }

    pub async fn subscribe(&self) -> Result<Subscription> {
        self.ask(Command::Subscribe).await
    }

    /// Remove a subscriber. True when it was the last one, in which case
    /// polling has stopped.
    pub async fn unsubscribe(&self, id: u64) -> Result<bool> {
        self.ask(|tx| Command::Unsubscribe(id, tx)).await
    }

    /// (Re)load from scratch, resetting the backoff.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Fetch again now. False for catalogs and while a fetch is running.
    pub async fn request_more(&self) -> Result<bool> {
        self.ask(Command::RequestMore).await
    }

    pub fn request_more_and_reset_timer(&self) -> Result<()> {
        self.send(Command::RequestMoreAndResetTimer)
    }

    /// Fetch only if the poll timer would already have fired.
    pub fn load_more_if_time(&self) -> Result<()> {
        self.send(Command::LoadMoreIfTime)
    }

    /// Re-deliver the current snapshot, then fetch again.
    pub async fn quick_load(&self) -> Result<()> {
        if self.ask(Command::QuickLoad).await? {
            Ok(())
        } else {
            Err(WatchError::Other(format!("{} has not loaded yet", self.loadable)))
        }
    }

    /// Stop the timer and any fetch, keeping subscribers.
    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub async fn status(&self) -> Result<LoaderStatus> {
        self.ask(Command::Status).await
    }

    /// Last good snapshot. Survives later errors.
    pub async fn snapshot(&self) -> Result<Option<Arc<ThreadSnapshot>>> {
        self.ask(Command::Snapshot).await
    }

    pub fn set_cursor(&self, cursor: ViewCursor) -> Result<()> {
        self.send(Command::SetCursor(cursor))
    }

    pub async fn loadable(&self) -> Result<Loadable> {
        self.ask(Command::Loadable).await
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }
}

struct LoaderActor {
    loadable: Loadable,
    site: Arc<dyn SiteAdapter>,
    transport: Arc<dyn HttpTransport>,
    scheduler: PollScheduler,
    coordinator: FetchCoordinator<FetchResult>,
    snapshot: Option<Arc<ThreadSnapshot>>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<LoaderEvent>)>,
    next_subscriber: u64,
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn load(
    transport: Arc<dyn HttpTransport>,
    site: Arc<dyn SiteAdapter>,
    loadable: Loadable,
    previous: PostIndex,
) -> FetchResult {
    let request = site
        .build_fetch_request(&loadable)
        .map_err(TransportError::from)?;
    let response = execute(transport.as_ref(), site.as_ref(), request).await?;
    Ok(site.parse_response(&loadable, &response.body, &previous)?)
}

impl LoaderActor {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion<FetchResult>>,
    ) {
        loop {
            let deadline = self.scheduler.deadline();

            tokio::select! {
                biased;

                command = inbox.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(completion) = completions.recv() => self.complete(completion),
                _ = sleep_until_deadline(deadline) => self.timer_fired(),
            }
        }

        self.coordinator.cancel();
        self.scheduler.stop();
        self.subscribers.clear();
        debug!("Loader for {} stopped", self.loadable);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe(reply) => {
                let (tx, events) = mpsc::unbounded_channel();
                let id = self.next_subscriber;
                self.next_subscriber += 1;
                self.subscribers.push((id, tx));
                let _ = reply.send(Subscription { id, events });
            }
            Command::Unsubscribe(id, reply) => {
                self.subscribers.retain(|(sub, _)| *sub != id);
                let last = self.subscribers.is_empty();
                if last {
                    self.stop();
                }
                let _ = reply.send(last);
            }
            Command::Start => self.start(),
            Command::RequestMore(reply) => {
                let _ = reply.send(self.request_more());
            }
            Command::RequestMoreAndResetTimer => {
                if !self.coordinator.is_in_flight() {
                    self.scheduler.reset_step();
                    self.request_more();
                }
            }
            Command::LoadMoreIfTime => {
                if self.scheduler.time_until_load_more(Instant::now()) <= 0 {
                    self.request_more();
                }
            }
            Command::QuickLoad(reply) => match self.snapshot.clone() {
                Some(snapshot) => {
                    self.broadcast(LoaderEvent::Data(snapshot));
                    self.request_more();
                    let _ = reply.send(true);
                }
                None => {
                    let _ = reply.send(false);
                }
            },
            Command::Pause => self.stop(),
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot.clone());
            }
            Command::SetCursor(cursor) => self.loadable.cursor = cursor,
            Command::Loadable(reply) => {
                let _ = reply.send(self.loadable.clone());
            }
            Command::Shutdown => {}
        }
    }

    fn start(&mut self) {
        if self.loadable.is_catalog() {
            self.loadable.cursor = ViewCursor::default();
        }
        self.scheduler.start();
        info!("Loading {}", self.loadable);
        self.fetch();
    }

    fn request_more(&mut self) -> bool {
        if !self.scheduler.can_request_more() {
            return false;
        }
        self.scheduler.begin_fetch();
        self.fetch();
        true
    }

    fn stop(&mut self) {
        if self.coordinator.cancel() {
            debug!("Cancelled fetch of {}", self.loadable);
        }
        self.scheduler.stop();
    }

    fn fetch(&mut self) {
        let previous = self
            .snapshot
            .as_ref()
            .map(|s| s.index())
            .unwrap_or_default();

        let generation = self.coordinator.begin(load(
            self.transport.clone(),
            self.site.clone(),
            self.loadable.clone(),
            previous,
        ));
        debug!("Fetching {} (generation {})", self.loadable, generation);
    }

    fn complete(&mut self, completion: Completion<FetchResult>) {
        let generation = completion.generation;
        let Some(result) = self.coordinator.accept(completion) else {
            debug!("Discarding stale result {} for {}", generation, self.loadable);
            return;
        };

        let merged = result.and_then(|batch| {
            reconcile(
                &self.loadable,
                self.snapshot.as_deref(),
                batch,
                self.site.comment_parser(),
            )
        });

        match merged {
            Ok(snapshot) => {
                self.scheduler.on_success(snapshot.len(), Instant::now());
                debug!(
                    "Loaded {} posts for {}, next step {}",
                    snapshot.len(),
                    self.loadable,
                    self.scheduler.current_step()
                );
                let snapshot = Arc::new(snapshot);
                self.snapshot = Some(snapshot.clone());
                self.broadcast(LoaderEvent::Data(snapshot));
            }
            Err(e) => {
                self.scheduler.on_failure();
                debug!("Loading {} failed: {}", self.loadable, e);
                self.broadcast(LoaderEvent::Error(e));
            }
        }
    }

    fn timer_fired(&mut self) {
        if self.scheduler.timer_fired(Instant::now()) {
            debug!("Poll timer fired for {}", self.loadable);
            self.scheduler.begin_fetch();
            self.fetch();
        }
    }

    /// Send to every live subscriber; stop polling once all have gone away.
    fn broadcast(&mut self, event: LoaderEvent) {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        if before > 0 && self.subscribers.is_empty() {
            debug!("All subscribers of {} dropped", self.loadable);
            self.stop();
        }
    }

    fn status(&self) -> LoaderStatus {
        LoaderStatus {
            state: self.scheduler.state(),
            current_step: self.scheduler.current_step(),
            time_until_load_more_ms: self.scheduler.time_until_load_more(Instant::now()),
            is_loading: self.scheduler.is_loading(),
            post_count: self.snapshot.as_ref().map_or(0, |s| s.len()),
            subscribers: self.subscribers.len(),
        }
    }
}
