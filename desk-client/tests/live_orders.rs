//! End-to-end: desk client against a real order hub on a loopback port

use std::sync::Arc;
use std::time::Duration;

use desk_client::live::{LiveConnector, WsConnector};
use desk_client::{
    ClientConfig, DeskError, DeskNotice, LiveConfig, LiveStatus, OrderApi, OrderDesk,
    OrderListQuery,
};
use order_hub::{Config, ServerState};
use rust_decimal::Decimal;
use shared::message::{CreateOrderRequest, NewLineItem, StatusUpdateRequest};
use shared::order::CustomerSnapshot;
use shared::{Order, OrderKey, OrderStatus};
use tokio::net::TcpListener;

const TOKEN: &str = "desk-test-token";
const WAIT: Duration = Duration::from_secs(5);

struct Hub {
    state: ServerState,
    config: ClientConfig,
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.state.shutdown.cancel();
    }
}

async fn start_hub() -> Hub {
    let mut config = Config::with_overrides(0);
    config.live_access_token = Some(TOKEN.into());
    config.default_list_limit = 50;
    config.max_list_limit = 200;
    let state = ServerState::new(config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(order_hub::serve(listener, state.clone()));

    Hub {
        state,
        config: ClientConfig::new(format!("http://{}", addr)).with_token(TOKEN),
    }
}

fn open_desk(hub: &Hub) -> OrderDesk {
    let api: Arc<dyn OrderApi> = Arc::new(hub.config.build_http_client().unwrap());
    let live = Arc::new(
        hub.config
            .build_live_manager(LiveConfig::lan().with_max_reconnect_attempts(2)),
    );
    OrderDesk::new(api, live, TOKEN)
}

fn place(state: &ServerState, name: &str) -> Order {
    state
        .orders
        .create(CreateOrderRequest {
            customer: CustomerSnapshot {
                name: name.into(),
                ..Default::default()
            },
            items: vec![NewLineItem::new("sku-1", 2, Decimal::new(1250, 2))],
            ..Default::default()
        })
        .unwrap()
}

/// Block until the hub has registered `n` live sessions
async fn wait_for_sessions(state: &ServerState, n: usize) {
    tokio::time::timeout(WAIT, async {
        while state.live.session_count() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("live session never registered");
}

async fn wait_for_status(desk: &OrderDesk, id: &str, status: OrderStatus) {
    tokio::time::timeout(WAIT, async {
        while desk.order(id).map(|o| o.status) != Some(status) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("order never reached expected status");
}

#[tokio::test]
async fn test_initial_fetch_over_http() {
    let hub = start_hub().await;
    let older = place(&hub.state, "Older");
    let newer = place(&hub.state, "Newer");

    let desk = open_desk(&hub);
    assert_eq!(desk.load_initial(OrderListQuery::all()).await.unwrap(), 2);

    let ids: Vec<String> = desk.current_orders().into_iter().map(|o| o.id).collect();
    assert!(ids.contains(&older.id));
    assert!(ids.contains(&newer.id));
    assert!(!desk.is_loading());
}

#[tokio::test]
async fn test_created_order_reaches_subscribed_view() {
    let hub = start_hub().await;
    let desk = open_desk(&hub);
    let mut notices = desk.notices();

    assert_eq!(desk.load_initial(OrderListQuery::all()).await.unwrap(), 0);
    assert_eq!(
        desk.subscribe_to_live_updates().await.unwrap(),
        LiveStatus::Connected
    );
    wait_for_sessions(&hub.state, 1).await;

    let order = place(&hub.state, "Live Buyer");

    let notice = loop {
        match tokio::time::timeout(WAIT, notices.recv()).await.unwrap().unwrap() {
            DeskNotice::NewOrder { id, label } => break (id, label),
            _ => continue,
        }
    };
    assert_eq!(notice.0, order.id);
    assert_eq!(Some(notice.1), order.order_number);

    let orders = desk.current_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0], order);
}

#[tokio::test]
async fn test_transition_and_echo_leave_one_entry() {
    let hub = start_hub().await;
    let order = place(&hub.state, "Echo");
    let number = order.order_number.clone().unwrap();

    let desk = open_desk(&hub);
    desk.load_initial(OrderListQuery::all()).await.unwrap();
    desk.subscribe_to_live_updates().await.unwrap();
    wait_for_sessions(&hub.state, 1).await;

    // Another operator confirms; the view follows the live event
    hub.state
        .orders
        .change_status(
            &order.id,
            StatusUpdateRequest {
                status: OrderStatus::Confirmed,
                note: None,
            },
        )
        .unwrap();
    wait_for_status(&desk, &order.id, OrderStatus::Confirmed).await;

    // This view moves it on; the PATCH response and the live echo reconcile
    // into the same entry
    let updated = desk
        .submit_transition(
            &OrderKey::number(number),
            OrderStatus::Processing,
            Some("  picking started ".into()),
        )
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);
    assert_eq!(
        updated.status_history.last().unwrap().note.as_deref(),
        Some("picking started")
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    let orders = desk.current_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Processing);
    assert!(desk.transition().draft().note.is_empty());
}

#[tokio::test]
async fn test_stale_view_gets_remote_rejection() {
    let hub = start_hub().await;
    let order = place(&hub.state, "Stale");

    // Not subscribed: this view never hears about the cancellation
    let desk = open_desk(&hub);
    desk.load_initial(OrderListQuery::all()).await.unwrap();

    hub.state
        .orders
        .change_status(
            &order.id,
            StatusUpdateRequest {
                status: OrderStatus::Cancelled,
                note: Some("customer called".into()),
            },
        )
        .unwrap();

    let err = desk
        .submit_transition(
            &OrderKey::id(order.id.as_str()),
            OrderStatus::Confirmed,
            Some("ready".into()),
        )
        .await
        .unwrap_err();

    match &err {
        DeskError::RemoteRejection(message) => {
            assert_eq!(message, "Cannot move order from cancelled to confirmed");
        }
        other => panic!("Expected RemoteRejection, got {:?}", other),
    }
    assert_eq!(err.user_message(), "Cannot move order from cancelled to confirmed");

    // The view keeps its copy and the operator's note
    assert_eq!(desk.order(&order.id).unwrap().status, OrderStatus::Pending);
    assert_eq!(desk.transition().draft().note, "ready");

    // Reloading brings the hub's truth in
    desk.reload().await.unwrap();
    assert_eq!(desk.order(&order.id).unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_open_detail_by_number() {
    let hub = start_hub().await;
    let order = place(&hub.state, "Detail");
    let desk = open_desk(&hub);

    let detail = desk
        .open_detail(&OrderKey::number(order.order_number.clone().unwrap()))
        .await
        .unwrap();
    assert_eq!(detail.id, order.id);
    assert_eq!(desk.selected_order().unwrap().id, order.id);

    let err = desk
        .open_detail(&OrderKey::id("000000000000000000000000"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));
}

#[tokio::test]
async fn test_live_channel_rejects_bad_tokens() {
    let hub = start_hub().await;
    let connector = WsConnector::new(hub.config.live_url.clone());

    assert!(connector.connect("").await.is_err());
    assert!(connector.connect("not-the-token").await.is_err());
    assert!(connector.connect(TOKEN).await.is_ok());
}
