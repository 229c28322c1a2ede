//! Watch the order list of a running order hub
//!
//! Loads the list, follows live updates and prints each change. Optionally
//! moves one order on startup.
//!
//! Run: DESK_TOKEN=dev cargo run --example watch_orders -- [order-number target-status]

use std::sync::Arc;

use desk_client::{
    ClientConfig, DeskNotice, LiveConfig, OrderDesk, OrderKey, OrderListQuery, OrderStatus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,desk_client=debug".into()),
        )
        .init();

    let config = ClientConfig::from_env();
    let credential = config.credential()?.to_string();
    let api = Arc::new(config.build_http_client()?);
    let live = Arc::new(config.build_live_manager(LiveConfig::wan()));
    let desk = OrderDesk::new(api, live, credential);

    let count = desk.load_initial(OrderListQuery::all().with_limit(50)).await?;
    println!("Loaded {} orders", count);
    for order in desk.current_orders() {
        println!("  {:<24} {:<10} {}", order.display_label(), order.status, order.final_amount());
    }

    let mut args = std::env::args().skip(1);
    if let (Some(number), Some(target)) = (args.next(), args.next()) {
        let target: OrderStatus = target.parse()?;
        match desk
            .submit_transition(&OrderKey::number(number), target, None)
            .await
        {
            Ok(order) => println!("{} is now {}", order.display_label(), order.status),
            Err(e) => println!("Could not change status: {}", e.user_message()),
        }
    }

    desk.subscribe_to_live_updates().await?;
    let mut notices = desk.notices();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notice = notices.recv() => match notice {
                Ok(DeskNotice::NewOrder { label, .. }) => println!("New order {}", label),
                Ok(DeskNotice::LiveStatusChanged(status)) => println!("Live: {:?}", status),
                Ok(DeskNotice::ResyncRecommended { .. }) => {
                    desk.reload().await?;
                    println!("Reloaded {} orders", desk.current_orders().len());
                }
                Err(_) => break,
            },
        }
    }

    desk.unsubscribe();
    Ok(())
}
