//! Subscription lifecycle management.
//!
//! A [`Subscription`] creates a subscription on the control plane, attaches a
//! messaging connection with the returned credentials, re-emits decrypted
//! notifications, and renews the grant shortly before it expires until it is
//! canceled or a renewal fails.
//!
//! # Reentrancy
//!
//! Control-plane calls are made without holding the state lock, so `cancel`
//! can complete while a subscribe or renewal request is still in flight.
//! Every asynchronous completion carries the generation it started under and
//! is discarded if the generation has moved on, so a canceled subscription is
//! never resurrected by a late response.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use push_messaging::{MessagingEvent, MessagingHandle, MessagingService};
use rest_client::RestApi;
use tokio::sync::futures::Notified;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::api;
use crate::config::SubscriptionConfig;
use crate::error::{Result, SubscriptionError};
use crate::event::{ErrorDetail, ErrorEvent, EventHub, EventReceiver, SubscriptionEvent};
use crate::renewal::{renewal_delay, RenewalTask};
use crate::types::{SubscriptionInfo, SubscriptionRequest, SubscriptionStatus};

/// A renewable, push-delivered event subscription.
///
/// Cloning is cheap; clones share the same subscription. Dropping the last
/// clone stops renewal but does not delete the server-side subscription,
/// which then lapses at its expiration time. Call [`cancel`](Self::cancel)
/// to delete it eagerly.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use pushsub::Subscription;
/// use rest_client::{RestClient, RestConfig};
///
/// let rest = RestClient::new(
///     RestConfig::new("https://platform.example.com/restapi/v1.0").with_access_token(token),
/// )?;
/// let subscription = Subscription::new(Arc::new(rest), Arc::new(messaging));
///
/// subscription.on_message(|payload| println!("notification: {payload}"));
/// subscription
///     .subscribe(["/restapi/v1.0/account/~/extension/~/presence"])
///     .await?;
///
/// // ... later
/// subscription.cancel().await?;
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    rest: Arc<dyn RestApi>,
    messaging: Arc<dyn MessagingService>,
    config: SubscriptionConfig,
    state: Mutex<SubscriptionState>,
    events: EventHub,
    /// Woken when a cancel leaves the Canceling phase
    cancel_done: Notify,
}

struct SubscriptionState {
    status: SubscriptionStatus,
    /// Bumped whenever in-flight work must stop applying its result
    generation: u64,
    id: String,
    expiration_time: Option<DateTime<Utc>>,
    event_filters: Vec<String>,
    handle: Option<Arc<dyn MessagingHandle>>,
    pump: Option<JoinHandle<()>>,
    renewal: Option<RenewalTask>,
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self {
            status: SubscriptionStatus::Idle,
            generation: 0,
            id: String::new(),
            expiration_time: None,
            event_filters: Vec::new(),
            handle: None,
            pump: None,
            renewal: None,
        }
    }
}

impl SubscriptionState {
    fn apply(&mut self, info: &SubscriptionInfo) {
        self.id = info.id.clone();
        self.expiration_time = Some(info.expiration_time);
        // A response without filters keeps the ones already sent
        if !info.event_filters.is_empty() {
            self.event_filters = info.event_filters.clone();
        }
    }

    /// Whether work started under `generation` may still touch this state
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.handle.is_some()
    }

    /// Reset to Idle. Returns the messaging handle, which the caller must
    /// tear down once the lock is released.
    fn clear(&mut self) -> Option<Arc<dyn MessagingHandle>> {
        self.generation += 1;
        self.status = SubscriptionStatus::Idle;
        self.id.clear();
        self.expiration_time = None;
        self.event_filters.clear();

        if let Some(renewal) = self.renewal.take() {
            renewal.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        self.handle.take()
    }
}

impl Subscription {
    /// Create a subscription manager with default configuration
    pub fn new(rest: Arc<dyn RestApi>, messaging: Arc<dyn MessagingService>) -> Self {
        Self::build(rest, messaging, SubscriptionConfig::default())
    }

    /// Create a subscription manager with custom configuration
    pub fn with_config(
        rest: Arc<dyn RestApi>,
        messaging: Arc<dyn MessagingService>,
        config: SubscriptionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(rest, messaging, config))
    }

    fn build(
        rest: Arc<dyn RestApi>,
        messaging: Arc<dyn MessagingService>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rest,
                messaging,
                config,
                state: Mutex::new(SubscriptionState::default()),
                events: EventHub::default(),
                cancel_done: Notify::new(),
            }),
        }
    }

    /// Create a subscription for `event_filters` and start delivering events.
    ///
    /// # Errors
    ///
    /// - `AlreadySubscribed` if a subscription is attached or being set up;
    ///   nothing is sent in that case.
    /// - `Rest` / `InvalidResponse` if the control plane rejects the request.
    /// - `Messaging` if the delivery channel cannot be opened; the created
    ///   server subscription is deleted on a best-effort basis.
    /// - `Canceled` if [`cancel`](Self::cancel) ran before setup finished.
    ///
    /// Dropping the returned future before it completes leaves the
    /// subscription idle; anything already set up is released in the
    /// background.
    pub async fn subscribe<I, S>(&self, event_filters: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let event_filters: Vec<String> = event_filters.into_iter().map(Into::into).collect();

        let generation = {
            let mut state = self.inner.state.lock();
            if state.status != SubscriptionStatus::Idle || state.handle.is_some() {
                return Err(SubscriptionError::AlreadySubscribed);
            }
            state.status = SubscriptionStatus::Subscribing;
            state.generation
        };

        let mut setup = PendingSetup::new(Arc::clone(&self.inner), generation);
        let result = self.inner.establish(event_filters, &mut setup).await;

        if result.is_err() {
            setup.rollback().await;
        }

        result
    }

    /// Delete the subscription and release the messaging connection.
    ///
    /// Local state is cleared even when the DELETE fails; the error is still
    /// returned. Does nothing when there is no subscription. A cancel issued
    /// while another one is in flight waits for it and returns `Ok(())`.
    pub async fn cancel(&self) -> Result<()> {
        let step = {
            let mut state = self.inner.state.lock();
            let status = state.status;
            match status {
                SubscriptionStatus::Idle => return Ok(()),
                // Registered under the lock so the wakeup cannot be missed
                SubscriptionStatus::Canceling => CancelStep::Wait(self.inner.cancel_done.notified()),
                SubscriptionStatus::Subscribing => {
                    // The in-flight subscribe sees the new generation and cleans up
                    state.generation += 1;
                    state.status = SubscriptionStatus::Idle;
                    tracing::debug!("Subscription canceled while subscribing");
                    return Ok(());
                }
                SubscriptionStatus::Active => {
                    state.generation += 1;
                    state.status = SubscriptionStatus::Canceling;
                    if let Some(renewal) = state.renewal.take() {
                        renewal.cancel();
                    }
                    CancelStep::Delete(state.id.clone(), state.generation)
                }
            }
        };

        let (id, generation) = match step {
            CancelStep::Wait(done) => {
                done.await;
                return Ok(());
            }
            CancelStep::Delete(id, generation) => (id, generation),
        };

        let pending = PendingCancel {
            inner: Arc::clone(&self.inner),
            generation,
        };

        let result = api::delete_subscription(self.inner.rest.as_ref(), &id).await;

        let handle = {
            let mut state = self.inner.state.lock();
            if state.generation == generation {
                state.clear()
            } else {
                None
            }
        };
        if let Some(handle) = handle {
            handle.teardown().await;
        }
        drop(pending);

        match &result {
            Ok(()) => tracing::info!("Subscription {} canceled", id),
            Err(e) => tracing::warn!(
                "Failed to delete subscription {}: {}; local state cleared anyway",
                id,
                e
            ),
        }

        result
    }

    /// Register a listener for decrypted notification payloads
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.events.add_callback(Arc::new(move |event: &SubscriptionEvent| {
            if let SubscriptionEvent::Message(payload) = event {
                listener(payload.as_str());
            }
        }));
    }

    /// Register a listener for asynchronous errors
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_callback(Arc::new(move |event: &SubscriptionEvent| {
            if let SubscriptionEvent::Error(error) = event {
                listener(error);
            }
        }));
    }

    /// Receive every event from now on, in emission order
    pub fn events(&self) -> EventReceiver {
        self.inner.events.add_channel()
    }

    /// Number of registered listeners and live event receivers
    pub fn listener_count(&self) -> usize {
        self.inner.events.listener_count()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.inner.state.lock().status
    }

    /// Whether a messaging connection is attached
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().handle.is_some()
    }

    /// Server-assigned id of the current subscription
    pub fn id(&self) -> Option<String> {
        let state = self.inner.state.lock();
        (!state.id.is_empty()).then(|| state.id.clone())
    }

    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().expiration_time
    }

    /// Filters sent with the next renewal
    pub fn event_filters(&self) -> Vec<String> {
        self.inner.state.lock().event_filters.clone()
    }

    /// When the pending renewal is due, if one is scheduled
    pub fn next_renewal_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().renewal.as_ref().map(RenewalTask::due_at)
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.inner.config
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subscription")
            .field("status", &state.status)
            .field("id", &state.id)
            .field("expiration_time", &state.expiration_time)
            .field("event_filters", &state.event_filters)
            .finish()
    }
}

impl Inner {
    async fn establish(
        self: &Arc<Self>,
        event_filters: Vec<String>,
        setup: &mut PendingSetup,
    ) -> Result<()> {
        let request = SubscriptionRequest::new(event_filters, self.config.delivery_mode.clone());
        let info = api::create_subscription(self.rest.as_ref(), &request).await?;
        setup.created = Some(info.id.clone());
        tracing::debug!(
            "Subscription {} created, expires at {}",
            info.id,
            info.expiration_time
        );

        let credentials = &info.delivery_mode;
        let handle = self.messaging.connect(&credentials.subscriber_key).await?;
        setup.handle = Some(Arc::clone(&handle));

        let (tx, rx) = mpsc::unbounded_channel();
        setup.pump = Some(tokio::spawn(forward_events(
            Arc::clone(&handle),
            credentials.encryption_key.clone(),
            rx,
            self.events.clone(),
        )));

        // A wrong address is not reported here; nothing will ever arrive
        handle.listen(&credentials.address, tx).await?;

        {
            let mut state = self.state.lock();
            if state.generation != setup.generation {
                tracing::debug!("Subscription {} canceled during setup, discarding", info.id);
                return Err(SubscriptionError::Canceled);
            }

            state.status = SubscriptionStatus::Active;
            state.handle = setup.handle.take();
            state.pump = setup.pump.take();
            setup.created = None;
            state.event_filters = request.event_filters.clone();
            state.apply(&info);
            self.schedule_renewal(&mut state);
        }

        tracing::info!(
            "Subscription {} active on channel {}",
            info.id,
            info.delivery_mode.address
        );
        Ok(())
    }

    /// Best-effort delete of a server subscription nobody will use
    async fn discard_remote(&self, id: &str) {
        if let Err(e) = api::delete_subscription(self.rest.as_ref(), id).await {
            tracing::warn!("Failed to delete orphaned subscription {}: {}", id, e);
        }
    }

    fn schedule_renewal(self: &Arc<Self>, state: &mut SubscriptionState) {
        let Some(expiration) = state.expiration_time else {
            return;
        };

        if let Some(previous) = state.renewal.take() {
            previous.cancel();
        }

        let delay = renewal_delay(expiration, Utc::now(), self.config.renewal_handicap);
        let generation = state.generation;
        let inner = Arc::downgrade(self);

        tracing::debug!("Renewal of subscription {} due in {:?}", state.id, delay);

        state.renewal = Some(RenewalTask::schedule(delay, async move {
            if let Some(inner) = inner.upgrade() {
                inner.renew(generation).await;
            }
        }));
    }

    async fn renew(self: &Arc<Self>, generation: u64) {
        let prepared = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            // Clear the slot before any await so nothing double-schedules
            state.renewal = None;

            if state.id.is_empty() {
                return;
            }

            let expiration = state.expiration_time;
            match expiration {
                Some(expiration) if Utc::now() < expiration => Ok((
                    state.id.clone(),
                    SubscriptionRequest::new(
                        state.event_filters.clone(),
                        self.config.delivery_mode.clone(),
                    ),
                )),
                _ => Err(SubscriptionError::Expired),
            }
        };

        let result = match prepared {
            Ok((id, request)) => {
                tracing::debug!("Renewing subscription {}", id);
                api::renew_subscription(self.rest.as_ref(), &id, &request).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(info) => {
                let mut state = self.state.lock();
                if !state.is_current(generation) {
                    tracing::debug!("Discarding renewal of canceled subscription {}", info.id);
                    return;
                }
                state.apply(&info);
                self.schedule_renewal(&mut state);
                tracing::debug!(
                    "Subscription {} renewed until {}",
                    info.id,
                    info.expiration_time
                );
            }
            Err(error) => {
                let handle = {
                    let mut state = self.state.lock();
                    if !state.is_current(generation) {
                        tracing::debug!("Discarding renewal failure of canceled subscription");
                        return;
                    }
                    state.clear()
                };
                if let Some(handle) = handle {
                    handle.teardown().await;
                }

                tracing::warn!("Subscription auto refresh failed: {}", error);
                self.events.emit(SubscriptionEvent::Error(ErrorEvent::new(
                    format!("Subscription auto refresh error: {}", error),
                    ErrorDetail::Request(Arc::new(error)),
                )));
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(renewal) = state.renewal.take() {
            renewal.cancel();
        }
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        if let Some(handle) = state.handle.take() {
            spawn_cleanup(async move { handle.teardown().await });
        }
        if !state.id.is_empty() {
            tracing::debug!(
                "Subscription {} dropped while active; it lapses at {:?}",
                state.id,
                state.expiration_time
            );
        }
    }
}

enum CancelStep<'a> {
    Wait(Notified<'a>),
    Delete(String, u64),
}

/// Progress of an in-flight `subscribe`.
///
/// Whatever is still held here when the guard drops was never committed and
/// is released: the phase goes back to Idle, the pump is aborted, and the
/// connection teardown and server delete run on a spawned task.
struct PendingSetup {
    inner: Arc<Inner>,
    generation: u64,
    created: Option<String>,
    handle: Option<Arc<dyn MessagingHandle>>,
    pump: Option<JoinHandle<()>>,
}

impl PendingSetup {
    fn new(inner: Arc<Inner>, generation: u64) -> Self {
        Self {
            inner,
            generation,
            created: None,
            handle: None,
            pump: None,
        }
    }

    /// Undo a failed setup, waiting for the cleanup to finish
    async fn rollback(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(handle) = self.handle.take() {
            handle.teardown().await;
        }
        if let Some(id) = self.created.take() {
            self.inner.discard_remote(&id).await;
        }
        self.release();
    }

    fn release(&self) {
        let mut state = self.inner.state.lock();
        if state.generation == self.generation && state.status == SubscriptionStatus::Subscribing {
            state.status = SubscriptionStatus::Idle;
        }
    }
}

impl Drop for PendingSetup {
    fn drop(&mut self) {
        self.release();

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        let handle = self.handle.take();
        let created = self.created.take();
        if handle.is_none() && created.is_none() {
            return;
        }

        tracing::debug!("Subscribe abandoned during setup, releasing resources");
        let rest = Arc::clone(&self.inner.rest);
        spawn_cleanup(async move {
            if let Some(handle) = handle {
                handle.teardown().await;
            }
            if let Some(id) = created {
                if let Err(e) = api::delete_subscription(rest.as_ref(), &id).await {
                    tracing::warn!("Failed to delete orphaned subscription {}: {}", id, e);
                }
            }
        });
    }
}

/// Clears an in-flight cancel whose future was dropped, and wakes waiters
struct PendingCancel {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for PendingCancel {
    fn drop(&mut self) {
        let handle = {
            let mut state = self.inner.state.lock();
            if state.generation == self.generation {
                state.clear()
            } else {
                None
            }
        };
        if let Some(handle) = handle {
            spawn_cleanup(async move { handle.teardown().await });
        }
        self.inner.cancel_done.notify_waiters();
    }
}

/// Run async cleanup from a synchronous drop, if a runtime is around
fn spawn_cleanup<F>(cleanup: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(cleanup);
        }
        Err(_) => tracing::warn!("No tokio runtime; messaging connection left open"),
    }
}

/// Decrypt inbound messages and surface error statuses, in delivery order
async fn forward_events(
    handle: Arc<dyn MessagingHandle>,
    encryption_key: String,
    mut rx: push_messaging::EventReceiver,
    events: EventHub,
) {
    while let Some(event) = rx.recv().await {
        match event {
            MessagingEvent::Message(message) => {
                // Unencrypted delivery modes hand out no key
                if encryption_key.is_empty() {
                    events.emit(SubscriptionEvent::Message(message.message));
                    continue;
                }

                match handle.decrypt(&message.message, &encryption_key) {
                    Ok(plaintext) => events.emit(SubscriptionEvent::Message(plaintext)),
                    Err(e) => {
                        tracing::warn!("Failed to decrypt message on {}: {}", message.channel, e);
                        events.emit(SubscriptionEvent::Error(ErrorEvent::new(
                            format!("Failed to decrypt message on channel {}: {}", message.channel, e),
                            ErrorDetail::Decrypt(Arc::new(e)),
                        )));
                    }
                }
            }
            MessagingEvent::Status(status) if status.error => {
                // The messaging service reconnects on its own; the handle stays attached
                tracing::warn!("Messaging status error, category: {}", status.category);
                events.emit(SubscriptionEvent::Error(ErrorEvent::new(
                    format!("Messaging status error, category: {}", status.category),
                    ErrorDetail::Status(status),
                )));
            }
            MessagingEvent::Status(status) => {
                tracing::trace!("Messaging status: {}", status.category);
            }
        }
    }
}
