mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use common::fixtures::{
    catalog, compress, fast_feed_config, outfitting_message, populated_index, shipyard_message,
    wait_for,
};
use common::transport::{MockEvent, MockFeed};

use starport::catalog::{ModuleCategory, Ship};
use starport::feed::{FeedContext, FeedListener, FeedSupervisor, ListenerExit, ListenerState};

const WAIT: Duration = Duration::from_secs(5);

fn listener() -> Arc<FeedListener> {
    let catalog = catalog();
    let index = populated_index(&catalog);
    Arc::new(FeedListener::new(catalog, index, fast_feed_config()))
}

fn listener_with_index() -> (Arc<FeedListener>, Arc<starport::index::SpatialIndex>) {
    let catalog = catalog();
    let index = populated_index(&catalog);
    (
        Arc::new(FeedListener::new(catalog, index.clone(), fast_feed_config())),
        index,
    )
}

#[test]
fn test_unrecognized_schema_only_bumps_discard_counter() {
    let (listener, index) = listener_with_index();
    let (_, before) = index.station("Sol", "Abraham Lincoln").unwrap();
    let updates_before = index.stats().station_updates;

    let payload = json!({
        "$schemaRef": "http://schemas.elite-markets.net/eddn/commodity/2",
        "message": {"systemName": "Sol", "stationName": "Abraham Lincoln", "commodities": []}
    })
    .to_string();
    listener.handle_frame(&compress(&payload)).unwrap();
    listener
        .handle_frame(&compress(r#"{"message": {"systemName": "Sol"}}"#))
        .unwrap();

    let stats = listener.stats().snapshot();
    assert_eq!(stats.frames_received, 2);
    assert_eq!(stats.discarded, 2);
    assert_eq!(stats.parse_errors, 0);
    assert_eq!(stats.decompression_errors, 0);
    assert_eq!(stats.shipyard_applied + stats.outfitting_applied, 0);

    let (_, after) = index.station("Sol", "Abraham Lincoln").unwrap();
    assert_eq!(before, after);
    assert_eq!(index.stats().station_updates, updates_before);
}

#[test]
fn test_outfitting_with_unknown_module_applies_the_rest() {
    let (listener, index) = listener_with_index();
    let payload = outfitting_message(
        "Lave",
        "Lave Station",
        json!([
            {"category": "standard", "name": "Power Plant", "class": 2, "rating": "D"},
            {"category": "standard", "name": "Warp Core", "class": 5, "rating": "A"},
            {"category": "hardpoint", "name": "Pulse Laser", "class": 1, "rating": "F", "mount": "Fixed"},
            {"category": "utility", "name": "Shield Booster", "class": 0, "rating": "A"}
        ]),
    );
    listener.handle_frame(&compress(&payload)).unwrap();

    let stats = listener.stats().snapshot();
    assert_eq!(stats.outfitting_applied, 1);
    assert_eq!(stats.unknown_modules, 1);

    let catalog = catalog();
    let (_, station) = index.station("Lave", "Lave Station").unwrap();
    let described = catalog.describe(&station.outfitting);
    assert_eq!(described[&ModuleCategory::Standard], vec!["pp2".to_string()]);
    assert_eq!(described[&ModuleCategory::Hardpoint], vec!["pl1".to_string()]);
    assert_eq!(described[&ModuleCategory::Utility], vec!["sb1".to_string()]);
    // Internal was absent from the message and keeps its previous inventory.
    assert_eq!(described[&ModuleCategory::Internal], vec!["fs1".to_string()]);
}

#[test]
fn test_shipyard_message_sets_ships() {
    let (listener, index) = listener_with_index();
    let payload = shipyard_message("sol", "abraham lincoln", &["Sidewinder", "Cobra Mk. III", "Unicorn"]);
    listener.handle_frame(&compress(&payload)).unwrap();

    let stats = listener.stats().snapshot();
    assert_eq!(stats.shipyard_applied, 1);
    assert_eq!(stats.unknown_ships, 1);

    let (_, station) = index.station("Sol", "Abraham Lincoln").unwrap();
    assert!(station.has_shipyard);
    assert!(station.sells_ship(Ship::Sidewinder));
    assert!(station.sells_ship(Ship::CobraMkIii));
}

#[test]
fn test_bad_frames_are_counted_not_fatal() {
    let (listener, index) = listener_with_index();
    assert!(listener.handle_frame(b"definitely not zlib").is_err());

    let truncated = format!(
        "{{\"$schemaRef\": \"{}\", \"message\": ",
        common::fixtures::SHIPYARD_SCHEMA
    );
    assert!(listener.handle_frame(&compress(&truncated)).is_err());

    // Unknown system is a lookup miss, not a frame error.
    let payload = shipyard_message("Nowhere", "Ghost Port", &["Eagle"]);
    assert!(listener.handle_frame(&compress(&payload)).is_ok());

    let stats = listener.stats().snapshot();
    assert_eq!(stats.decompression_errors, 1);
    assert_eq!(stats.parse_errors, 1);
    assert_eq!(index.stats().unknown_systems, 1);
}

#[tokio::test]
async fn test_listener_run_stops_on_shutdown() {
    let listener = listener();
    let feed = MockFeed::new();
    let (tx, rx) = watch::channel(false);

    let task = tokio::spawn({
        let listener = listener.clone();
        let transport = feed.transport();
        async move { listener.run(transport, rx).await }
    });

    feed.send(MockEvent::Frame(compress(&shipyard_message(
        "Lave",
        "Lave Station",
        &["Eagle"],
    ))));
    assert!(wait_for(|| listener.stats().snapshot().shipyard_applied == 1, WAIT).await);
    assert_eq!(listener.state(), ListenerState::Listening);
    assert!(listener.is_connected());

    tx.send(true).unwrap();
    let exit = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(exit, ListenerExit::Stopped);
    assert_eq!(listener.state(), ListenerState::Disconnected);
}

#[tokio::test]
async fn test_transport_error_reconnects() {
    let listener = listener();
    let feed = MockFeed::new();
    let (_tx, rx) = watch::channel(false);

    let task = tokio::spawn({
        let listener = listener.clone();
        let transport = feed.transport();
        async move { listener.run(transport, rx).await }
    });

    feed.send(MockEvent::Fail("connection reset".to_string()));
    feed.send(MockEvent::Frame(compress(&shipyard_message(
        "Sol",
        "Abraham Lincoln",
        &["Viper"],
    ))));
    assert!(wait_for(|| listener.stats().snapshot().shipyard_applied == 1, WAIT).await);
    assert_eq!(listener.stats().snapshot().transport_errors, 1);
    assert!(feed.connects() >= 2);

    feed.send(MockEvent::Terminate);
    let exit = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(exit, ListenerExit::Terminated);
    assert_eq!(listener.state(), ListenerState::Terminated);
}

#[tokio::test]
async fn test_terminated_context_interrupts_pending_receive() {
    let listener = listener();
    let feed = MockFeed::new();
    let context = FeedContext::new();
    let (_tx, rx) = watch::channel(false);

    let task = tokio::spawn({
        let listener = listener.clone();
        let transport = (feed.factory())(&context);
        async move { listener.run(transport, rx).await }
    });
    assert!(wait_for(|| listener.is_connected(), WAIT).await);

    context.terminate();
    let exit = tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(exit, ListenerExit::Terminated);
    assert_eq!(listener.state(), ListenerState::Terminated);
    assert_eq!(listener.stats().snapshot().transport_errors, 0);
    assert_eq!(feed.connects(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_supervisor_stop_terminates_transport_context() {
    let listener = listener();
    let feed = MockFeed::new();
    let supervisor = FeedSupervisor::new(listener.clone(), feed.factory());

    supervisor.start().unwrap();
    assert!(wait_for(|| supervisor.is_running(), WAIT).await);
    supervisor.stop();

    let contexts = feed.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].is_terminated());

    supervisor.start().unwrap();
    assert!(wait_for(|| supervisor.is_running(), WAIT).await);
    let contexts = feed.contexts();
    assert_eq!(contexts.len(), 2);
    assert!(!contexts[1].is_terminated());
    supervisor.stop();
    assert_eq!(listener.state(), ListenerState::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_supervisor_start_stop_restart() {
    let listener = listener();
    let feed = MockFeed::new();
    let supervisor = FeedSupervisor::new(listener.clone(), feed.factory());
    assert!(!supervisor.is_running());
    assert!(!supervisor.health().healthy);

    supervisor.start().unwrap();
    // Starting twice keeps the single worker.
    supervisor.start().unwrap();
    assert!(wait_for(|| supervisor.is_running(), WAIT).await);
    assert!(supervisor.health().healthy);
    assert_eq!(feed.connects(), 1);

    feed.send(MockEvent::Frame(compress(&shipyard_message(
        "Sol",
        "Abraham Lincoln",
        &["Hauler"],
    ))));
    assert!(wait_for(|| listener.stats().snapshot().shipyard_applied == 1, WAIT).await);

    supervisor.stop();
    assert!(!supervisor.is_running());
    assert_eq!(listener.state(), ListenerState::Disconnected);

    supervisor.restart().unwrap();
    assert!(wait_for(|| supervisor.is_running(), WAIT).await);
    assert_eq!(feed.connects(), 2);

    feed.send(MockEvent::Frame(compress(&shipyard_message(
        "Sol",
        "Abraham Lincoln",
        &["Adder"],
    ))));
    assert!(wait_for(|| listener.stats().snapshot().shipyard_applied == 2, WAIT).await);
    supervisor.stop();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_supervisor_terminated_is_not_restarted() {
    let listener = listener();
    let feed = MockFeed::new();
    let supervisor = FeedSupervisor::new(listener.clone(), feed.factory());
    supervisor.start().unwrap();
    assert!(wait_for(|| supervisor.is_running(), WAIT).await);

    feed.send(MockEvent::Terminate);
    assert!(wait_for(|| listener.state() == ListenerState::Terminated, WAIT).await);
    assert!(!supervisor.is_running());

    let health = supervisor.health();
    assert!(!health.healthy);
    assert_eq!(health.message.as_deref(), Some("feed transport terminated"));
    assert_eq!(feed.connects(), 1);
    supervisor.stop();
}
