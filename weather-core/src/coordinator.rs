//! Single source of truth for what the UI shows.
//!
//! A background task owns the [`UiState`]. Commands (`select_city`, `retry`)
//! and fetch completions reach it through one channel, so transitions are
//! applied one at a time and listeners observe them in order. Issuing a
//! command also publishes its loading state at once, so `state()` never
//! lags behind the caller.
//!
//! Every command carries a request number. A completion is applied only if
//! its number is the latest one issued; anything older is dropped, which
//! keeps "last command wins" even when fetches finish out of order.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::{
    ProviderError,
    client::WeatherSource,
    model::{City, UiState, WeatherObservation},
    store::KeyValueStore,
};

/// Store key holding the last selected city.
pub const SELECTED_CITY_KEY: &str = "selected_city";

type Listener = Arc<dyn Fn(&UiState) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl Listeners {
    fn insert(&mut self, listener: Listener) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Select(City),
    Retry,
}

impl Command {
    /// Loading transition, applied both to the published snapshot and to
    /// the task's own state.
    fn begin(self, state: &mut UiState) {
        if let Command::Select(city) = self {
            state.current_city = city;
        }
        state.is_loading = true;
        state.error = None;
    }
}

enum Message {
    Issued {
        request: u64,
        command: Command,
    },
    Completed {
        request: u64,
        city: City,
        result: Result<WeatherObservation, ProviderError>,
    },
}

#[derive(Debug, Clone)]
struct Published {
    request: u64,
    state: UiState,
}

/// Latest request number and the snapshot readers see, kept under one lock.
struct Issuer {
    last_request: u64,
    published: watch::Sender<Published>,
}

/// Handle removing its listener when dropped.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

pub struct StateCoordinator {
    issuer: Arc<Mutex<Issuer>>,
    tx: mpsc::UnboundedSender<Message>,
    published: watch::Receiver<Published>,
    listeners: Arc<Mutex<Listeners>>,
    store: Arc<dyn KeyValueStore>,
}

impl StateCoordinator {
    /// Restore the persisted city and start loading it immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(source: Arc<dyn WeatherSource>, store: Arc<dyn KeyValueStore>) -> Self {
        const INITIAL_REQUEST: u64 = 1;

        let city = persisted_city(store.as_ref());
        let initial = UiState::loading(city);

        let (tx, rx) = mpsc::unbounded_channel();
        let (published_tx, published) = watch::channel(Published {
            request: INITIAL_REQUEST,
            state: initial.clone(),
        });
        let issuer = Arc::new(Mutex::new(Issuer {
            last_request: INITIAL_REQUEST,
            published: published_tx,
        }));
        let listeners = Arc::new(Mutex::new(Listeners::default()));

        let actor = Actor {
            state: initial,
            latest_request: INITIAL_REQUEST,
            source,
            inbox: tx.downgrade(),
            issuer: issuer.clone(),
            listeners: listeners.clone(),
        };
        actor.start_fetch(INITIAL_REQUEST, city);
        tokio::spawn(actor.run(rx));

        tracing::info!(%city, "state coordinator started");

        Self {
            issuer,
            tx,
            published,
            listeners,
            store,
        }
    }

    /// Snapshot of the current state.
    ///
    /// Reflects a command as soon as it is issued: right after
    /// `select_city`, the new city is shown as loading.
    pub fn state(&self) -> UiState {
        self.published.borrow().state.clone()
    }

    /// Remember `city`, switch to it and start loading its weather.
    pub fn select_city(&self, city: City) {
        if let Err(err) = self.store.set(SELECTED_CITY_KEY, city.as_str()) {
            tracing::warn!(%city, error = %err, "failed to persist selected city");
        }
        self.issue(Command::Select(city));
    }

    /// Load the current city again.
    pub fn retry(&self) {
        self.issue(Command::Retry);
    }

    /// Register `listener`; it is called after every state transition.
    ///
    /// Listeners run on the coordinator task, in transition order, and
    /// should return quickly.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&UiState) + Send + Sync + 'static,
    {
        let id = self.listeners.lock().insert(Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Wait until the most recently issued command has finished loading.
    pub async fn settled(&self) -> UiState {
        let target = self.issuer.lock().last_request;
        let mut published = self.published.clone();

        let settled = published
            .wait_for(|p| p.request >= target && !p.state.is_loading)
            .await
            .map(|p| p.state.clone());

        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    fn issue(&self, command: Command) {
        let mut issuer = self.issuer.lock();
        issuer.last_request += 1;
        let request = issuer.last_request;

        issuer.published.send_modify(|p| {
            p.request = request;
            command.begin(&mut p.state);
        });

        if self.tx.send(Message::Issued { request, command }).is_err() {
            tracing::warn!(request, "state coordinator task has stopped; command dropped");
        }
    }
}

impl fmt::Debug for StateCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCoordinator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn persisted_city(store: &dyn KeyValueStore) -> City {
    match store.get(SELECTED_CITY_KEY) {
        Ok(Some(value)) => value.parse().unwrap_or_else(|err| {
            tracing::warn!(value = %value, error = %err, "ignoring persisted city");
            City::default()
        }),
        Ok(None) => City::default(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read persisted city");
            City::default()
        }
    }
}

struct Actor {
    state: UiState,
    latest_request: u64,
    source: Arc<dyn WeatherSource>,
    inbox: mpsc::WeakUnboundedSender<Message>,
    issuer: Arc<Mutex<Issuer>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Issued { request, command } => self.begin(request, command),
                Message::Completed {
                    request,
                    city,
                    result,
                } => self.complete(request, city, result),
            }
        }

        tracing::debug!("state coordinator stopped");
    }

    fn begin(&mut self, request: u64, command: Command) {
        match command {
            Command::Select(city) if city != self.state.current_city => {
                tracing::info!(from = %self.state.current_city, to = %city, "city changed");
            }
            _ => {}
        }

        self.latest_request = request;
        command.begin(&mut self.state);
        self.publish();
        self.start_fetch(request, self.state.current_city);
    }

    fn start_fetch(&self, request: u64, city: City) {
        let source = self.source.clone();
        let inbox = self.inbox.clone();

        tokio::spawn(async move {
            let result = source.get_weather(city).await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Message::Completed {
                    request,
                    city,
                    result,
                });
            }
        });
    }

    fn complete(
        &mut self,
        request: u64,
        city: City,
        result: Result<WeatherObservation, ProviderError>,
    ) {
        // A command issued but not yet received here also supersedes.
        let latest_issued = self.issuer.lock().last_request;
        if request != latest_issued {
            tracing::debug!(
                request,
                latest = latest_issued,
                %city,
                "discarding superseded weather result"
            );
            return;
        }

        match result {
            Ok(observation) => {
                self.state.observation = Some(observation);
                self.state.error = None;
            }
            Err(err) => {
                tracing::warn!(%city, kind = %err.kind(), "weather request failed");
                self.state.error = Some(err.user_message());
            }
        }
        self.state.is_loading = false;
        self.publish();
    }

    fn publish(&self) {
        {
            // Never overwrite the snapshot of a command still in the channel.
            let issuer = self.issuer.lock();
            if issuer.last_request == self.latest_request {
                issuer.published.send_replace(Published {
                    request: self.latest_request,
                    state: self.state.clone(),
                });
            }
        }

        let listeners = self.listeners.lock().snapshot();
        for listener in listeners {
            listener(&self.state);
        }
    }
}
