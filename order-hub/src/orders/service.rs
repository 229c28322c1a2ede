//! Order service
//!
//! The authoritative status state machine. Every change is re-validated with
//! the shared transition table regardless of what the client checked, then
//! recorded in the order's history and broadcast on the live channel.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::message::{CreateOrderRequest, LiveFrame, OrderListQuery, StatusUpdateRequest};
use shared::order::{
    LineItem, Order, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, Pricing,
    StatusChange,
};
use shared::util::object_id;

use super::OrderRepository;
use crate::live::LiveHub;
use crate::utils::{AppError, AppResult};

#[derive(Clone)]
pub struct OrderService {
    repo: OrderRepository,
    live: LiveHub,
}

impl OrderService {
    pub fn new(repo: OrderRepository, live: LiveHub) -> Self {
        Self { repo, live }
    }

    pub fn repository(&self) -> &OrderRepository {
        &self.repo
    }

    pub fn list(&self, query: &OrderListQuery, limit: usize) -> Vec<Order> {
        self.repo.find_all(query.status, limit)
    }

    pub fn get(&self, id: &str) -> AppResult<Order> {
        self.repo
            .find_by_id(id)
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", id)))
    }

    pub fn get_by_number(&self, number: &str) -> AppResult<Order> {
        self.repo
            .find_by_number(number)
            .ok_or_else(|| AppError::not_found(format!("Order {} not found", number)))
    }

    /// Place an order; pricing is computed here, never taken from the caller
    pub fn create(&self, req: CreateOrderRequest) -> AppResult<Order> {
        validate_create(&req)?;
        let now = Utc::now();

        let items: Vec<LineItem> = req
            .items
            .into_iter()
            .map(|item| LineItem {
                line_total: item.unit_price * Decimal::from(item.quantity),
                product: item.product,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let subtotal: Decimal = items.iter().map(|item| item.line_total).sum();
        let pricing = Pricing {
            subtotal,
            discount: req.discount,
            shipping: req.shipping,
            tax: req.tax,
            final_amount: (subtotal - req.discount).max(Decimal::ZERO) + req.shipping + req.tax,
        };

        let order = Order {
            id: object_id(),
            order_number: Some(self.repo.next_order_number(now)),
            status: OrderStatus::Pending,
            customer: req.customer,
            items,
            pricing,
            payment_info: PaymentInfo {
                method: req.payment_method,
                ..PaymentInfo::default()
            },
            shipping_address: req.shipping_address,
            status_history: vec![StatusChange {
                status: OrderStatus::Pending,
                note: Some("Order placed".into()),
                changed_at: now,
            }],
            created_at: now,
            updated_at: None,
        };

        let order = self.repo.insert(order)?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.display_label(),
            amount = %order.pricing.final_amount,
            "Order created"
        );
        self.live.publish(LiveFrame::created(order.clone()));
        Ok(order)
    }

    /// Move an order along the lifecycle
    pub fn change_status(&self, id: &str, req: StatusUpdateRequest) -> AppResult<Order> {
        let note = req
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let target = req.status;

        // 持有条目时广播：同一订单的事件顺序与提交顺序一致
        let order = self.repo.update_and_then(
            id,
            |order| {
                if !order.status.can_transition_to(target) {
                    return Err(AppError::invalid_transition(order.status, target));
                }
                apply_transition(order, target, note, Utc::now());
                Ok(())
            },
            |order| {
                self.live.publish(LiveFrame::updated(order.clone()));
            },
        );

        let order = match order {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(order_id = %id, to = %target, error = %e, "Status change refused");
                return Err(e);
            }
        };

        tracing::info!(order_id = %order.id, status = %order.status, "Order status changed");
        Ok(order)
    }
}

fn validate_create(req: &CreateOrderRequest) -> AppResult<()> {
    if req.customer.name.trim().is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }
    if req.items.is_empty() {
        return Err(AppError::validation("Order must contain at least one item"));
    }
    for (position, item) in req.items.iter().enumerate() {
        if item.product.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Item {} has no product",
                position + 1
            )));
        }
        if item.quantity == 0 {
            return Err(AppError::validation(format!(
                "Item {} has zero quantity",
                position + 1
            )));
        }
        if item.unit_price.is_sign_negative() {
            return Err(AppError::validation(format!(
                "Item {} has a negative price",
                position + 1
            )));
        }
    }
    if [req.discount, req.shipping, req.tax]
        .iter()
        .any(|amount| amount.is_sign_negative())
    {
        return Err(AppError::validation("Amounts cannot be negative"));
    }
    Ok(())
}

/// Status, history and payment side effects of one accepted transition
fn apply_transition(
    order: &mut Order,
    target: OrderStatus,
    note: Option<String>,
    now: DateTime<Utc>,
) {
    order.status = target;
    order.updated_at = Some(now);
    order.status_history.push(StatusChange {
        status: target,
        note,
        changed_at: now,
    });

    let payment = &mut order.payment_info;
    match target {
        // Cash collected on delivery
        OrderStatus::Delivered
            if payment.method == PaymentMethod::Cod && payment.status == PaymentStatus::Pending =>
        {
            payment.status = PaymentStatus::Paid;
            payment.paid_at = Some(now);
        }
        OrderStatus::Cancelled if payment.status == PaymentStatus::Paid => {
            payment.status = PaymentStatus::Refunded;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::NewLineItem;
    use shared::order::CustomerSnapshot;

    fn service() -> OrderService {
        OrderService::new(OrderRepository::new(), LiveHub::default())
    }

    fn request(method: PaymentMethod) -> CreateOrderRequest {
        CreateOrderRequest {
            customer: CustomerSnapshot {
                name: "Asha Rao".into(),
                ..Default::default()
            },
            items: vec![
                NewLineItem::new("p-1", 2, Decimal::new(25000, 2)).with_name("Kettle"),
                NewLineItem::new("p-2", 1, Decimal::new(9950, 2)),
            ],
            payment_method: method,
            discount: Decimal::new(5000, 2),
            shipping: Decimal::new(4000, 2),
            ..Default::default()
        }
    }

    fn status(s: OrderStatus) -> StatusUpdateRequest {
        StatusUpdateRequest {
            status: s,
            note: None,
        }
    }

    #[test]
    fn test_create_computes_pricing() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Upi)).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.id.len(), 24);
        assert!(order.order_number.as_deref().unwrap().starts_with("ORD-"));
        assert_eq!(order.items[0].line_total, Decimal::new(50000, 2));
        assert_eq!(order.pricing.subtotal, Decimal::new(59950, 2));
        // 599.50 - 50.00 + 40.00
        assert_eq!(order.pricing.final_amount, Decimal::new(58950, 2));
        assert_eq!(order.status_history.len(), 1);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let svc = service();

        let mut req = request(PaymentMethod::Card);
        req.items.clear();
        assert!(matches!(svc.create(req), Err(AppError::Validation(_))));

        let mut req = request(PaymentMethod::Card);
        req.items[1].quantity = 0;
        assert!(matches!(svc.create(req), Err(AppError::Validation(_))));

        let mut req = request(PaymentMethod::Card);
        req.customer.name = " ".into();
        assert!(matches!(svc.create(req), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_broadcasts() {
        let svc = service();
        let mut rx = svc.live.subscribe();
        let order = svc.create(request(PaymentMethod::Cod)).unwrap();

        match rx.recv().await.unwrap() {
            LiveFrame::OrderCreated(payload) => assert_eq!(payload.order.id, order.id),
            other => panic!("Expected OrderCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_change_status_records_history_and_broadcasts() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Card)).unwrap();
        let mut rx = svc.live.subscribe();

        let updated = svc
            .change_status(
                &order.id,
                StatusUpdateRequest {
                    status: OrderStatus::Confirmed,
                    note: Some("  stock checked ".into()),
                },
            )
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert!(updated.updated_at.is_some());
        let last = updated.status_history.last().unwrap();
        assert_eq!(last.status, OrderStatus::Confirmed);
        assert_eq!(last.note.as_deref(), Some("stock checked"));
        assert_eq!(updated.pricing, order.pricing);

        match rx.recv().await.unwrap() {
            LiveFrame::OrderUpdated(payload) => assert_eq!(payload.order, updated),
            other => panic!("Expected OrderUpdated, got {:?}", other),
        }
    }

    #[test]
    fn test_illegal_transition_refused() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Card)).unwrap();

        let err = svc
            .change_status(&order.id, status(OrderStatus::Shipped))
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(ref m) if m == "Cannot move order from pending to shipped"));

        let stored = svc.get(&order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[test]
    fn test_terminal_status_refused() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Card)).unwrap();
        svc.change_status(&order.id, status(OrderStatus::Cancelled))
            .unwrap();

        let err = svc
            .change_status(&order.id, status(OrderStatus::Confirmed))
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn test_cod_paid_on_delivery() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Cod)).unwrap();
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Packed,
            OrderStatus::Shipped,
        ] {
            let o = svc.change_status(&order.id, status(next)).unwrap();
            assert_eq!(o.payment_info.status, PaymentStatus::Pending);
        }

        let delivered = svc
            .change_status(&order.id, status(OrderStatus::Delivered))
            .unwrap();
        assert_eq!(delivered.payment_info.status, PaymentStatus::Paid);
        assert!(delivered.payment_info.paid_at.is_some());
        assert_eq!(delivered.status_history.len(), 6);
    }

    #[tokio::test]
    async fn test_concurrent_changes_broadcast_in_commit_order() {
        let svc = service();
        let order = svc.create(request(PaymentMethod::Card)).unwrap();
        let mut rx = svc.live.subscribe();
        let chain = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Packed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ];

        // Every worker races to push the order one step further
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let svc = svc.clone();
                let id = order.id.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        let current = svc.get(&id).unwrap().status;
                        if let Some(step) = chain.windows(2).find(|step| step[0] == current) {
                            let _ = svc.change_status(&id, status(step[1]));
                        }
                    }
                });
            }
        });

        let stored = svc.get(&order.id).unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.status_history.len(), chain.len());

        for expected in chain.into_iter().skip(1) {
            match rx.recv().await.unwrap() {
                LiveFrame::OrderUpdated(payload) => assert_eq!(payload.order.status, expected),
                other => panic!("Expected OrderUpdated, got {:?}", other),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_order() {
        let svc = service();
        assert!(matches!(
            svc.change_status("nope", status(OrderStatus::Confirmed)),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(svc.get_by_number("ORD-x"), Err(AppError::NotFound(_))));
    }
}
