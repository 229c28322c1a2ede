//! In-memory order repository

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::order::{Order, OrderStatus};

use crate::utils::{AppError, AppResult};

/// Orders keyed by id, with an order-number index
#[derive(Clone, Default)]
pub struct OrderRepository {
    orders: Arc<DashMap<String, Order>>,
    /// order_number → id
    numbers: Arc<DashMap<String, String>>,
    /// yyyymmdd → last issued sequence
    daily_seq: Arc<DashMap<String, u32>>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) -> AppResult<Order> {
        if self.orders.contains_key(&order.id) {
            return Err(AppError::Conflict(format!("Order {} already exists", order.id)));
        }
        if let Some(number) = &order.order_number {
            if self.numbers.contains_key(number) {
                return Err(AppError::Conflict(format!(
                    "Order number {} already exists",
                    number
                )));
            }
            self.numbers.insert(number.clone(), order.id.clone());
        }
        self.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    pub fn find_by_id(&self, id: &str) -> Option<Order> {
        self.orders.get(id).map(|entry| entry.value().clone())
    }

    pub fn find_by_number(&self, number: &str) -> Option<Order> {
        let id = self.numbers.get(number)?.value().clone();
        self.find_by_id(&id)
    }

    /// Newest first, optionally filtered by status
    pub fn find_all(&self, status: Option<OrderStatus>, limit: usize) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        orders.truncate(limit);
        orders
    }

    /// Apply `change` atomically; the stored record is untouched if it fails
    pub fn update<F>(&self, id: &str, change: F) -> AppResult<Order>
    where
        F: FnOnce(&mut Order) -> AppResult<()>,
    {
        self.update_and_then(id, change, |_| {})
    }

    /// `update`, then `committed` runs before the entry lock is released,
    /// so side effects observe commits in order
    pub fn update_and_then<F, C>(&self, id: &str, change: F, committed: C) -> AppResult<Order>
    where
        F: FnOnce(&mut Order) -> AppResult<()>,
        C: FnOnce(&Order),
    {
        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", id)))?;
        let mut draft = entry.value().clone();
        change(&mut draft)?;
        *entry.value_mut() = draft.clone();
        committed(&draft);
        Ok(draft)
    }

    /// Next human-facing number for the day, e.g. `ORD-20240112-0007`
    pub fn next_order_number(&self, now: DateTime<Utc>) -> String {
        let day = now.format("%Y%m%d").to_string();
        let seq = {
            let mut counter = self.daily_seq.entry(day.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        format!("ORD-{}-{:04}", day, seq)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
