//! End-to-end tests across the client, the hooks and the simulator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pulseboard::hooks::{
    AlertFeed, AlertFeedConfig, DomainHealthMonitor, HealthMonitorConfig, KpiBoard,
    KpiBoardConfig, MetricsStream, MetricsStreamConfig,
};
use pulseboard::realtime::testing::{settle, MockConnector};
use pulseboard::realtime::{
    Connector, ConnectionStatus, DataPointType, RealTimeDataPoint, RealtimeConfig,
    RealtimeContext,
};
use pulseboard::simulator::{
    build_router, LoopbackConnector, SimulatorConfig, SimulatorState, DASHBOARD_PATH,
};
use serde_json::json;

fn mock_context(connector: &Arc<MockConnector>) -> RealtimeContext {
    tokio_test::assert_ok!(RealtimeContext::with_connector(
        RealtimeConfig::default(),
        Arc::clone(connector) as Arc<dyn Connector>
    ))
}

fn kpi(id: &str, value: f64) -> RealTimeDataPoint {
    let data = json!({"id": id, "name": "Revenue", "value": value, "unit": "USD"});
    RealTimeDataPoint::new(
        1_700_000_000_000,
        DataPointType::Kpi,
        "sales",
        data.as_object().cloned().unwrap_or_default(),
    )
}

#[tokio::test]
async fn test_kpi_stream_latest_wins() {
    let connector = MockConnector::new();
    let ctx = mock_context(&connector);
    let board = KpiBoard::attach(&ctx, KpiBoardConfig::default()).expect("board");

    ctx.connect();
    let socket = connector.latest().expect("socket");
    socket.open();
    settle().await;
    assert!(ctx.is_connected());

    for value in [100.0, 110.0, 120.0, 130.0, 140.0] {
        socket.send_data("kpis", &kpi("sales_revenue", value));
    }
    settle().await;

    let snapshot = board.snapshot();
    assert_eq!(snapshot.kpis.len(), 1);
    assert_eq!(snapshot.kpis[0].value, 140.0);
    assert_eq!(snapshot.kpis[0].previous_value, Some(130.0));
    assert_eq!(ctx.message_count(), 5);
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe_once_per_channel() {
    let connector = MockConnector::new();
    let ctx = mock_context(&connector);
    ctx.connect();
    let socket = connector.latest().expect("socket");
    socket.open();
    settle().await;

    let first = ctx.subscribe("alerts", |_| {});
    let second = ctx.subscribe("alerts", |_| {});
    assert_eq!(ctx.subscriber_count("alerts"), 2);

    drop(first);
    assert_eq!(ctx.subscriber_count("alerts"), 1);
    drop(second);
    assert_eq!(ctx.subscriber_count("alerts"), 0);

    let kinds: Vec<String> = socket
        .sent_envelopes()
        .into_iter()
        .filter(|e| e.channel() == Some("alerts"))
        .map(|e| e.kind.to_string())
        .collect();
    assert_eq!(kinds, vec!["subscribe", "unsubscribe"]);
}

#[tokio::test]
async fn test_panicking_subscriber_is_isolated() {
    let connector = MockConnector::new();
    let ctx = mock_context(&connector);
    let delivered = Arc::new(AtomicUsize::new(0));

    let _bad = ctx.subscribe("kpis", |_| panic!("subscriber bug"));
    let counter = Arc::clone(&delivered);
    let _good = ctx.subscribe("kpis", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    ctx.connect();
    let socket = connector.latest().expect("socket");
    socket.open();
    settle().await;

    socket.send_data("kpis", &kpi("orders", 1.0));
    socket.send_data("kpis", &kpi("orders", 2.0));
    settle().await;

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert!(ctx.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_hooks_over_loopback_simulator() {
    let connector = LoopbackConnector::new(Duration::from_millis(100));
    let ctx = RealtimeContext::with_connector(
        RealtimeConfig::default(),
        Arc::new(connector) as Arc<dyn Connector>,
    )
    .expect("context");

    let kpis = KpiBoard::attach(&ctx, KpiBoardConfig::default()).expect("kpis");
    let health = DomainHealthMonitor::attach(&ctx, HealthMonitorConfig::default())
        .expect("health");
    let metrics = MetricsStream::attach(
        &ctx,
        MetricsStreamConfig::default().with_aggregation_window(Duration::from_millis(500)),
    )
    .expect("metrics");
    let alerts = AlertFeed::attach(&ctx, AlertFeedConfig::default()).expect("alerts");

    ctx.connect();
    settle().await;
    assert_eq!(ctx.connection_status(), ConnectionStatus::Connected);

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    settle().await;

    assert!(!kpis.snapshot().kpis.is_empty());
    assert!(!health.snapshot().domains.is_empty());
    assert!(!metrics.snapshot().samples.is_empty());
    assert!(!alerts.snapshot().alerts.is_empty());
    assert_eq!(ctx.error_count(), 0);

    ctx.disconnect();
    settle().await;
    assert_eq!(ctx.connection_status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_client_against_simulator_server() {
    let config = SimulatorConfig::default().with_tick_interval(Duration::from_millis(50));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let router = build_router(SimulatorState::new(&config));
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    let url = format!("ws://{}{}", addr, DASHBOARD_PATH);
    let ctx = RealtimeContext::new(RealtimeConfig::new(url)).expect("context");
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let _sub = ctx.subscribe("kpis", move |point| {
        assert_eq!(point.kind, DataPointType::Kpi);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    ctx.connect();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while received.load(Ordering::SeqCst) < 3 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(ctx.is_connected());
    assert!(received.load(Ordering::SeqCst) >= 3);

    ctx.shutdown();
}
