//! Order Store
//!
//! In-memory, ordered collection of the orders a view is showing. Every
//! mutation source (initial fetch, live events, transition responses) goes
//! through [`OrderStore::reconcile`], keyed on `Order::id` only. At most one
//! record per id is held after any sequence of calls.

use std::collections::HashMap;

use shared::order::Order;

/// What [`OrderStore::reconcile`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not held before, prepended at index 0
    Inserted,
    /// Replaced in place
    Replaced { index: usize },
    /// Identical value already held
    Unchanged { index: usize },
}

impl ReconcileOutcome {
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Ordered order collection with identity-based merge
#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    orders: Vec<Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held collection, keeping input order.
    ///
    /// Duplicate ids collapse into one record at the first position, holding
    /// the last value.
    pub fn replace_all(&mut self, orders: Vec<Order>) {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(orders.len());
        let mut held: Vec<Order> = Vec::with_capacity(orders.len());
        let mut duplicates = 0usize;

        for order in orders {
            if let Some(&index) = positions.get(&order.id) {
                held[index] = order;
                duplicates += 1;
            } else {
                positions.insert(order.id.clone(), held.len());
                held.push(order);
            }
        }

        if duplicates > 0 {
            tracing::warn!(duplicates, "Collapsed duplicate order ids in fetched list");
        }
        self.orders = held;
    }

    /// Merge one order by id: replace in place if held, else prepend.
    pub fn reconcile(&mut self, incoming: Order) -> ReconcileOutcome {
        match self.position(&incoming.id) {
            Some(index) if self.orders[index] == incoming => ReconcileOutcome::Unchanged { index },
            Some(index) => {
                self.orders[index] = incoming;
                ReconcileOutcome::Replaced { index }
            }
            None => {
                self.orders.insert(0, incoming);
                ReconcileOutcome::Inserted
            }
        }
    }

    /// Replace a held order, ignoring orders this view does not show
    pub fn refresh(&mut self, incoming: Order) -> Option<ReconcileOutcome> {
        self.position(&incoming.id)
            .map(|_| self.reconcile(incoming))
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Lookup by human-facing number (display lookups only, never merging)
    pub fn find_by_number(&self, number: &str) -> Option<&Order> {
        self.orders
            .iter()
            .find(|o| o.order_number.as_deref() == Some(number))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.orders.iter().position(|o| o.id == id)
    }

    /// Owned copy of the current ordered contents
    pub fn snapshot(&self) -> Vec<Order> {
        self.orders.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }
}
