//! Order Desk
//!
//! The surface one order-list view talks to. It owns the view's
//! [`OrderStore`] and detail projection and wires the initial fetch, the live
//! channel and the transition controller into them. Every write into the
//! store goes through [`OrderStore::reconcile`] (or `replace_all` for a full
//! fetch).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use shared::message::OrderListQuery;
use shared::order::{Order, OrderKey, OrderStatus};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::ClientError;
use crate::http::OrderApi;
use crate::live::{LiveConnection, LiveConnectionManager, LiveEvent, LiveStatus};
use crate::store::OrderStore;
use crate::transition::{
    StatusTransitionController, TransitionAvailability, TransitionError, availability,
};

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced to the view
#[derive(Debug, Error)]
pub enum DeskError {
    /// Rejected locally, nothing was sent
    #[error("{0}")]
    Validation(String),

    /// The hub refused the request; carries its message
    #[error("Rejected by server: {0}")]
    RemoteRejection(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[source] ClientError),

    #[error("Order {0} not found")]
    NotFound(OrderKey),

    #[error("Live updates unavailable")]
    LiveChannelDegraded,
}

impl DeskError {
    /// Plain-language text for the view. Transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::RemoteRejection(message) => message.clone(),
            Self::NetworkFailure(ClientError::Unauthorized) => {
                "Your session has expired. Please sign in again.".into()
            }
            Self::NetworkFailure(_) => {
                "Could not reach the order service. Check your connection and try again.".into()
            }
            Self::NotFound(_) => "That order could not be found. It may have been removed.".into(),
            Self::LiveChannelDegraded => {
                "Live updates are unavailable. The order list may be out of date until you reload."
                    .into()
            }
        }
    }
}

impl From<TransitionError> for DeskError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Validation { from, to, .. } => {
                Self::Validation(format!("An order that is {} cannot be moved to {}.", from, to))
            }
            TransitionError::FinalState { status, .. } => Self::Validation(format!(
                "This order is {} and can no longer change status.",
                status
            )),
            TransitionError::InFlight(_) => {
                Self::Validation("A status change for this order is already being saved.".into())
            }
            TransitionError::RemoteRejection(message) => Self::RemoteRejection(message),
            TransitionError::Network(e) => Self::NetworkFailure(e),
        }
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Side notifications for the view (toasts, banners)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeskNotice {
    /// A new order arrived over the live channel
    NewOrder { id: String, label: String },
    /// Live channel state changed
    LiveStatusChanged(LiveStatus),
    /// Events were missed; the list should be reloaded
    ResyncRecommended { missed: u64 },
}

/// Routing of live events into one view. Dropping it detaches the listener;
/// the connection stays up.
#[derive(Debug)]
pub struct LiveSubscription {
    connection: Arc<LiveConnection>,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    pub fn connection(&self) -> &Arc<LiveConnection> {
        &self.connection
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Counts one running list fetch
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(loads: &'a AtomicUsize) -> Self {
        loads.fetch_add(1, Ordering::AcqRel);
        Self(loads)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

// ============================================================================
// Desk
// ============================================================================

pub struct OrderDesk {
    api: Arc<dyn OrderApi>,
    live: Arc<LiveConnectionManager>,
    credential: String,
    store: Arc<Mutex<OrderStore>>,
    detail: Arc<Mutex<Option<Order>>>,
    controller: StatusTransitionController,
    notices: broadcast::Sender<DeskNotice>,
    subscription: Mutex<Option<LiveSubscription>>,
    query: Mutex<OrderListQuery>,
    loads: AtomicUsize,
    load_generation: AtomicU64,
}

impl OrderDesk {
    pub fn new(
        api: Arc<dyn OrderApi>,
        live: Arc<LiveConnectionManager>,
        credential: impl Into<String>,
    ) -> Self {
        let store = Arc::new(Mutex::new(OrderStore::new()));
        let detail = Arc::new(Mutex::new(None));
        let controller = StatusTransitionController::new(api.clone(), &store, &detail);
        let (notices, _) = broadcast::channel(64);
        Self {
            api,
            live,
            credential: credential.into(),
            store,
            detail,
            controller,
            notices,
            subscription: Mutex::new(None),
            query: Mutex::new(OrderListQuery::default()),
            loads: AtomicUsize::new(0),
            load_generation: AtomicU64::new(0),
        }
    }

    // ========== List ==========

    /// Fetch the list and replace the store with it.
    ///
    /// On failure the store keeps what it held (empty on first load); call
    /// again to retry. When fetches overlap only the most recently started
    /// one is applied; an older one that lands later is discarded.
    pub async fn load_initial(&self, query: OrderListQuery) -> Result<usize, DeskError> {
        *self.query.lock() = query.clone();
        let generation = self.load_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let _guard = LoadingGuard::enter(&self.loads);

        let orders = self.api.list_orders(&query).await.map_err(|e| {
            tracing::warn!(error = %e, "Initial order fetch failed");
            DeskError::NetworkFailure(e)
        })?;

        let mut store = self.store.lock();
        // 在 store 锁内比较代数，较新的结果不会被旧结果覆盖
        let latest = self.load_generation.load(Ordering::Acquire);
        if generation != latest {
            tracing::debug!(generation, latest, "Superseded order fetch discarded");
            return Ok(store.len());
        }
        store.replace_all(orders);
        tracing::info!(count = store.len(), "Order list loaded");
        Ok(store.len())
    }

    /// Fetch again with the last query
    pub async fn reload(&self) -> Result<usize, DeskError> {
        let query = self.query.lock().clone();
        self.load_initial(query).await
    }

    /// Any list fetch still running
    pub fn is_loading(&self) -> bool {
        self.loads.load(Ordering::Acquire) > 0
    }

    /// Ordered snapshot of the store
    pub fn current_orders(&self) -> Vec<Order> {
        self.store.lock().snapshot()
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        self.store.lock().get(id).cloned()
    }

    // ========== Live ==========

    /// Attach this view to the live channel.
    ///
    /// Reuses the process-wide connection for this credential. A second call
    /// replaces the previous listener.
    pub async fn subscribe_to_live_updates(&self) -> Result<LiveStatus, DeskError> {
        let connection = self.live.connect(&self.credential).await;
        let status = connection.status();
        if status == LiveStatus::Degraded {
            return Err(DeskError::LiveChannelDegraded);
        }

        let task = tokio::spawn(route_events(
            connection.subscribe(),
            connection.status_watch(),
            Arc::downgrade(&self.store),
            Arc::downgrade(&self.detail),
            self.notices.clone(),
        ));
        let previous = self
            .subscription
            .lock()
            .replace(LiveSubscription { connection, task });
        if previous.is_some() {
            tracing::debug!("Replaced live subscription");
        }
        Ok(status)
    }

    /// Detach this view's listener; the shared connection stays up
    pub fn unsubscribe(&self) {
        if self.subscription.lock().take().is_some() {
            tracing::debug!("Live subscription detached");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub async fn live_status(&self) -> LiveStatus {
        self.live.status().await
    }

    pub fn notices(&self) -> broadcast::Receiver<DeskNotice> {
        self.notices.subscribe()
    }

    // ========== Transitions ==========

    pub fn valid_next_statuses(&self, order: &Order) -> &'static [OrderStatus] {
        order.status.next_statuses()
    }

    pub fn availability(&self, order: &Order) -> TransitionAvailability {
        availability(order)
    }

    /// Draft state and in-flight flag of the transition form
    pub fn transition(&self) -> &StatusTransitionController {
        &self.controller
    }

    /// Move the order identified by `key` to `target`
    pub async fn submit_transition(
        &self,
        key: &OrderKey,
        target: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, DeskError> {
        let order = self.resolve(key).await?;
        self.controller
            .submit(&order, target, note)
            .await
            .map_err(DeskError::from)
    }

    // ========== Detail ==========

    /// Fetch one order and show it as the selected order
    pub async fn open_detail(&self, key: &OrderKey) -> Result<Order, DeskError> {
        let order = self.fetch(key).await?;
        *self.detail.lock() = Some(order.clone());
        self.store.lock().refresh(order.clone());
        Ok(order)
    }

    pub fn selected_order(&self) -> Option<Order> {
        self.detail.lock().clone()
    }

    pub fn close_detail(&self) {
        *self.detail.lock() = None;
    }

    /// The view's current copy, falling back to the hub
    async fn resolve(&self, key: &OrderKey) -> Result<Order, DeskError> {
        let held = {
            let store = self.store.lock();
            match key {
                OrderKey::Id(id) => store.get(id).cloned(),
                OrderKey::Number(number) => store.find_by_number(number).cloned(),
            }
        };
        let held = held.or_else(|| {
            self.detail.lock().clone().filter(|order| match key {
                OrderKey::Id(id) => &order.id == id,
                OrderKey::Number(number) => order.order_number.as_deref() == Some(number.as_str()),
            })
        });
        match held {
            Some(order) => Ok(order),
            None => self.fetch(key).await,
        }
    }

    async fn fetch(&self, key: &OrderKey) -> Result<Order, DeskError> {
        self.api.get_order(key).await.map_err(|e| match e {
            ClientError::NotFound(_) => DeskError::NotFound(key.clone()),
            e => DeskError::NetworkFailure(e),
        })
    }
}

/// Apply one live event to a view; `false` once the view is gone
fn apply_live_event(
    event: LiveEvent,
    store: &Weak<Mutex<OrderStore>>,
    detail: &Weak<Mutex<Option<Order>>>,
    notices: &broadcast::Sender<DeskNotice>,
) -> bool {
    let Some(store) = store.upgrade() else {
        return false;
    };
    let created = matches!(event, LiveEvent::Created(_));
    let order = event.into_order();

    let outcome = store.lock().reconcile(order.clone());
    tracing::debug!(order_id = %order.id, ?outcome, created, "Live event reconciled");

    if let Some(detail) = detail.upgrade() {
        let mut detail = detail.lock();
        if detail.as_ref().is_some_and(|shown| shown.id == order.id) {
            *detail = Some(order.clone());
        }
    }

    if created {
        let _ = notices.send(DeskNotice::NewOrder {
            label: order.display_label().to_string(),
            id: order.id,
        });
    }
    true
}

async fn route_events(
    mut events: broadcast::Receiver<LiveEvent>,
    mut status: watch::Receiver<LiveStatus>,
    store: Weak<Mutex<OrderStore>>,
    detail: Weak<Mutex<Option<Order>>>,
    notices: broadcast::Sender<DeskNotice>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !apply_live_event(event, &store, &detail, &notices) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Live listener lagged, list may be stale");
                    let _ = notices.send(DeskNotice::ResyncRecommended { missed });
                }
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                let _ = notices.send(DeskNotice::LiveStatusChanged(current));
            }
        }
    }
    tracing::debug!("Live routing stopped");
}
