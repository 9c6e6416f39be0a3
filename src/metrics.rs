use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_http_requests_total", "Total HTTP requests", &["method", "path", "status"]
    ).unwrap();

    // Index
    pub static ref SYSTEMS_TRACKED: IntGauge = register_int_gauge!(
        "starport_systems_tracked", "Star systems held by the index"
    ).unwrap();
    pub static ref STATIONS_TRACKED: IntGauge = register_int_gauge!(
        "starport_stations_tracked", "Stations held by the index"
    ).unwrap();
    pub static ref SYSTEMS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "starport_systems_dropped_total", "Systems dropped for lying outside the inhabited range"
    ).unwrap();
    pub static ref UNKNOWN_SYSTEM_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_unknown_system_total", "Station updates referencing an unknown system",
        &["source"]
    ).unwrap();
    pub static ref UNKNOWN_STATION_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_unknown_station_total", "Station updates referencing an unknown station",
        &["source"]
    ).unwrap();
    pub static ref STATION_UPDATES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_station_updates_total", "Station mutations applied", &["source"]
    ).unwrap();

    // Search
    pub static ref SEARCH_DURATION: Histogram = register_histogram!(
        "starport_search_duration_seconds", "find-near search duration",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    ).unwrap();
    pub static ref SEARCH_SHELLS_VISITED: Histogram = register_histogram!(
        "starport_search_shells_visited", "Shells expanded per find-near search",
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    ).unwrap();

    // Feed
    pub static ref FEED_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_feed_messages_total", "Feed messages applied", &["schema"]
    ).unwrap();
    pub static ref FEED_DISCARDED_TOTAL: IntCounter = register_int_counter!(
        "starport_feed_discarded_total", "Feed messages with an unrecognized schema"
    ).unwrap();
    pub static ref FEED_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_feed_errors_total", "Feed errors", &["kind"]
    ).unwrap();
    pub static ref FEED_RECONNECTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_feed_reconnects_total", "Feed reconnects", &["reason"]
    ).unwrap();
    pub static ref FEED_CONNECTED: IntGauge = register_int_gauge!(
        "starport_feed_connected", "1 while the feed listener holds a live subscription"
    ).unwrap();

    // Bulk refresh
    pub static ref REFRESH_RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "starport_refresh_runs_total", "Bulk refresh runs", &["status"]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&HTTP_REQUESTS_TOTAL);
    lazy_static::initialize(&SYSTEMS_TRACKED);
    lazy_static::initialize(&STATIONS_TRACKED);
    lazy_static::initialize(&SYSTEMS_DROPPED_TOTAL);
    lazy_static::initialize(&UNKNOWN_SYSTEM_TOTAL);
    lazy_static::initialize(&UNKNOWN_STATION_TOTAL);
    lazy_static::initialize(&STATION_UPDATES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
    lazy_static::initialize(&SEARCH_SHELLS_VISITED);
    lazy_static::initialize(&FEED_MESSAGES_TOTAL);
    lazy_static::initialize(&FEED_DISCARDED_TOTAL);
    lazy_static::initialize(&FEED_ERRORS_TOTAL);
    lazy_static::initialize(&FEED_RECONNECTS_TOTAL);
    lazy_static::initialize(&FEED_CONNECTED);
    lazy_static::initialize(&REFRESH_RUNS_TOTAL);
}
