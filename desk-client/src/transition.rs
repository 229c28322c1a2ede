//! Status Transition Controller
//!
//! Moves one order to a new status: validates locally against the shared
//! status policy, asks the hub to apply the change, then merges the order the
//! hub returns. The hub's answer is authoritative and may differ from the
//! local guess (history entries, timestamps, payment side effects).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use shared::message::StatusUpdateRequest;
use shared::order::{Order, OrderStatus};
use thiserror::Error;

use crate::ClientError;
use crate::http::OrderApi;
use crate::store::OrderStore;

/// What the transition form may offer for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAvailability {
    /// Terminal status, render a "final state" notice
    Final,
    /// Legal targets, in lifecycle order
    Available(&'static [OrderStatus]),
}

pub fn availability(order: &Order) -> TransitionAvailability {
    match order.status.next_statuses() {
        [] => TransitionAvailability::Final,
        targets => TransitionAvailability::Available(targets),
    }
}

/// Pending user input of the transition form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionDraft {
    pub target: Option<OrderStatus>,
    pub note: String,
}

impl TransitionDraft {
    fn note_for_request(&self) -> Option<String> {
        let note = self.note.trim();
        (!note.is_empty()).then(|| note.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Order {order} cannot move from {from} to {to}")]
    Validation {
        order: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Order {order} is {status}, which is final")]
    FinalState { order: String, status: OrderStatus },

    #[error("A status change for order {0} is already being submitted")]
    InFlight(String),

    #[error("Rejected by server: {0}")]
    RemoteRejection(String),

    #[error("Network failure: {0}")]
    Network(#[source] ClientError),
}

impl From<ClientError> for TransitionError {
    fn from(e: ClientError) -> Self {
        match e.rejection_message() {
            Some(message) => Self::RemoteRejection(message.to_string()),
            None => Self::Network(e),
        }
    }
}

/// Resets the in-flight flag even if the submit future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StatusTransitionController {
    api: Arc<dyn OrderApi>,
    store: Weak<Mutex<OrderStore>>,
    detail: Weak<Mutex<Option<Order>>>,
    draft: Mutex<TransitionDraft>,
    in_flight: AtomicBool,
}

impl StatusTransitionController {
    /// Bind to a view's store and detail projection.
    ///
    /// Both are held weakly: a response that lands after the view is gone is
    /// discarded.
    pub fn new(
        api: Arc<dyn OrderApi>,
        store: &Arc<Mutex<OrderStore>>,
        detail: &Arc<Mutex<Option<Order>>>,
    ) -> Self {
        Self {
            api,
            store: Arc::downgrade(store),
            detail: Arc::downgrade(detail),
            draft: Mutex::new(TransitionDraft::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn draft(&self) -> TransitionDraft {
        self.draft.lock().clone()
    }

    pub fn set_target(&self, target: Option<OrderStatus>) {
        self.draft.lock().target = target;
    }

    pub fn set_note(&self, note: impl Into<String>) {
        self.draft.lock().note = note.into();
    }

    /// A submit is pending (the form's submit control is disabled)
    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Local check only, no network
    pub fn validate(order: &Order, target: OrderStatus) -> Result<(), TransitionError> {
        if order.status.is_terminal() {
            return Err(TransitionError::FinalState {
                order: order.id.clone(),
                status: order.status,
            });
        }
        if !order.status.can_transition_to(target) {
            return Err(TransitionError::Validation {
                order: order.id.clone(),
                from: order.status,
                to: target,
            });
        }
        Ok(())
    }

    /// Submit with the draft's current target and note
    pub async fn submit_draft(&self, order: &Order) -> Result<Order, TransitionError> {
        let Some(target) = self.draft().target else {
            return Err(TransitionError::Validation {
                order: order.id.clone(),
                from: order.status,
                to: order.status,
            });
        };
        Self::validate(order, target)?;
        let guard = self.begin(order)?;
        self.send(order, target, guard).await
    }

    /// Move `order` to `target`.
    ///
    /// `note` replaces the draft note when given. On success the note is
    /// cleared; on any failure the draft is kept for a retry. A submit
    /// refused as in flight leaves the draft alone.
    pub async fn submit(
        &self,
        order: &Order,
        target: OrderStatus,
        note: Option<String>,
    ) -> Result<Order, TransitionError> {
        Self::validate(order, target)?;
        let guard = self.begin(order)?;
        {
            let mut draft = self.draft.lock();
            draft.target = Some(target);
            if let Some(note) = note {
                draft.note = note;
            }
        }
        self.send(order, target, guard).await
    }

    /// Claim the single in-flight slot
    fn begin(&self, order: &Order) -> Result<InFlightGuard<'_>, TransitionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransitionError::InFlight(order.id.clone()));
        }
        Ok(InFlightGuard(&self.in_flight))
    }

    async fn send(
        &self,
        order: &Order,
        target: OrderStatus,
        _guard: InFlightGuard<'_>,
    ) -> Result<Order, TransitionError> {
        let request = StatusUpdateRequest {
            status: target,
            note: self.draft.lock().note_for_request(),
        };

        tracing::info!(order_id = %order.id, from = %order.status, to = %target, "Submitting status change");
        let updated = match self.api.update_status(&order.id, &request).await {
            Ok(updated) => updated,
            Err(e) => {
                let err = TransitionError::from(e);
                tracing::warn!(order_id = %order.id, error = %err, "Status change failed");
                return Err(err);
            }
        };

        self.apply(&updated);
        *self.draft.lock() = TransitionDraft::default();
        Ok(updated)
    }

    /// Merge the authoritative order into whatever views are still alive
    fn apply(&self, updated: &Order) {
        match self.store.upgrade() {
            Some(store) => {
                let outcome = store.lock().reconcile(updated.clone());
                tracing::debug!(order_id = %updated.id, ?outcome, "Transition reconciled");
            }
            None => {
                tracing::debug!(order_id = %updated.id, "Order view gone, transition result discarded");
            }
        }

        if let Some(detail) = self.detail.upgrade() {
            let mut detail = detail.lock();
            if detail.as_ref().is_some_and(|shown| shown.id == updated.id) {
                *detail = Some(updated.clone());
            }
        }
    }
}
