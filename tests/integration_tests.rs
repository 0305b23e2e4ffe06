use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use chrono::{Local, TimeZone, Utc};
use pitemp::{
    config::{DisplayConfig, DisplayKind, Mode, RemoteConfig, SensorConfig},
    error::PitempError,
    lifecycle::{ActivityOutcome, Cleanup, Coordinator},
    web::create_app,
    App, AppConfig, AppState, DisplayDriver, DisplayUpdater, Frame, Measurement, MetricsSink,
    PrometheusMetrics, Reading, ReadingStore, RemoteFetcher, Sensor, SensorPoller, WebConfig,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct FixedSensor(f32, f32);

impl Sensor for FixedSensor {
    fn name(&self) -> &str {
        "fixed"
    }

    fn read(&mut self, _retries: u32) -> pitemp::Result<Measurement> {
        Ok(Measurement {
            temperature: self.0,
            humidity: self.1,
        })
    }
}

async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, content_type, body)
}

async fn spawn_peer(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A successful poll shows up in the store, the JSON API, the metrics and
/// the HTML page.
#[tokio::test]
async fn test_poll_visible_over_http() {
    let store = Arc::new(ReadingStore::new());
    let metrics = Arc::new(PrometheusMetrics::new().unwrap());
    let poller = SensorPoller::new(
        Box::new(FixedSensor(21.5, 40.0)),
        0,
        Duration::from_secs(60),
        store.clone(),
    )
    .with_metrics(metrics.clone() as Arc<dyn MetricsSink>);

    let reading = poller.poll_once().await.unwrap();
    assert_eq!(store.get(), reading);

    let state = AppState::new(store.clone()).with_metrics(Some(metrics));
    let app = create_app(state, &WebConfig::default());

    let (status, content_type, body) = get_body(app.clone(), "/api").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["Temperature"], 21.5);
    assert_eq!(json["Humidity"], 40.0);
    assert_eq!(json["IP"], "");
    let captured = reading.captured_at().unwrap();
    let served: chrono::DateTime<Utc> = json["LastSensorUpdate"].as_str().unwrap().parse().unwrap();
    assert_eq!(served, captured);

    let (status, _, body) = get_body(app.clone(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("pitemp_temperature_celsius 21.5"));
    assert!(text.contains("pitemp_humidity_percent 40"));
    assert!(text.contains(&format!("pitemp_last_update {}", captured.timestamp())));

    let (status, content_type, body) = get_body(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(String::from_utf8(body).unwrap().contains("21.5&deg;, 40&percnt; humidity"));
}

#[tokio::test]
async fn test_metrics_route_requires_registry() {
    let app = create_app(AppState::new(Arc::new(ReadingStore::new())), &WebConfig::default());
    let (status, _, _) = get_body(app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pioled_preview_is_a_png() {
    let app = create_app(AppState::new(Arc::new(ReadingStore::new())), &WebConfig::default());
    let (status, content_type, body) = get_body(app, "/pioled").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    let reader = png::Decoder::new(body.as_slice()).read_info().unwrap();
    assert_eq!(reader.info().width, 128);
    assert_eq!(reader.info().height, 32);
    assert_eq!(reader.info().bit_depth, png::BitDepth::One);
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app(AppState::new(Arc::new(ReadingStore::new())), &WebConfig::default());
    let (status, _, body) = get_body(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "pitemp");
}

/// The peer's reading, timestamp included, is copied verbatim.
#[tokio::test]
async fn test_remote_reading_propagates_verbatim() {
    let peer = Router::new().route(
        "/api",
        get(|| async {
            r#"{"Temperature":19,"Humidity":55,"IP":"10.0.0.5/24","LastSensorUpdate":"2024-03-01T12:00:00Z"}"#
        }),
    );
    let addr = spawn_peer(peer).await;

    let store = Arc::new(ReadingStore::new());
    let fetcher =
        RemoteFetcher::new(&RemoteConfig::new(format!("http://{}/api", addr)), store.clone()).unwrap();
    fetcher.fetch_once().await.unwrap();

    let reading = store.get();
    assert_eq!(reading.temperature(), 19.0);
    assert_eq!(reading.humidity(), 55.0);
    assert_eq!(
        reading.captured_at(),
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_remote_failures_keep_store() {
    let peer = Router::new()
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "sensor on fire") }),
        )
        .route("/garbage", get(|| async { "<html>not json</html>" }));
    let addr = spawn_peer(peer).await;

    let previous = Reading::new(20.0, 30.0, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let store = Arc::new(ReadingStore::with_reading(previous));

    let broken =
        RemoteFetcher::new(&RemoteConfig::new(format!("http://{}/broken", addr)), store.clone())
            .unwrap();
    assert!(matches!(broken.fetch_once().await, Err(PitempError::Fetch(_))));

    let garbage =
        RemoteFetcher::new(&RemoteConfig::new(format!("http://{}/garbage", addr)), store.clone())
            .unwrap();
    assert!(matches!(garbage.fetch_once().await, Err(PitempError::Decode(_))));

    assert_eq!(store.get(), previous);
}

struct CountingDisplay {
    renders: Arc<AtomicUsize>,
    cleanups: Arc<AtomicUsize>,
}

impl DisplayDriver for CountingDisplay {
    fn kind(&self) -> DisplayKind {
        DisplayKind::Oled
    }

    fn render(&mut self, _frame: &Frame) -> pitemp::Result<()> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cleanup(&mut self) -> pitemp::Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Auto-quit stops every activity and the display is cleaned up once.
#[tokio::test(start_paused = true)]
async fn test_auto_quit_cleans_up_display() {
    let renders = Arc::new(AtomicUsize::new(0));
    let cleanups = Arc::new(AtomicUsize::new(0));
    let driver = Box::new(CountingDisplay {
        renders: renders.clone(),
        cleanups: cleanups.clone(),
    });

    let store = Arc::new(ReadingStore::new());
    let config = DisplayConfig::oled().with_refresh_interval(Duration::from_secs(1));
    let updater = DisplayUpdater::new(driver, store.clone(), &config, "");

    let mut coordinator = Coordinator::new();
    coordinator.spawn("oled display", Cleanup::Required, |token| updater.run(token));
    coordinator.spawn("writer", Cleanup::None, move |token| async move {
        pitemp::run_periodic(&token, Duration::from_secs(2), || {
            let store = store.clone();
            async move { store.set(Reading::new(20.0, 30.0, Utc::now())) }
        })
        .await;
    });

    coordinator.run(Some(Duration::from_secs(5))).await;
    let summary = coordinator.shutdown().await;

    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
    assert!(renders.load(Ordering::SeqCst) >= 5);
    assert_eq!(summary.outcome("oled display"), Some(ActivityOutcome::Completed));
    assert!(!coordinator.shutdown_trigger());
}

fn iio_device(name: &str, temperature_milli: i32, humidity_milli: i32) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("pitemp-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("in_temp_input"), temperature_milli.to_string()).unwrap();
    std::fs::write(dir.join("in_humidityrelative_input"), humidity_milli.to_string()).unwrap();
    dir
}

async fn wait_for_capture(store: &ReadingStore) -> Reading {
    for _ in 0..100 {
        let reading = store.get();
        if reading.is_captured() {
            return reading;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no reading captured");
}

/// A server feeds a client, which mirrors the reading unchanged.
#[tokio::test]
async fn test_server_and_client_end_to_end() {
    let sensor = SensorConfig {
        iio_device: iio_device("e2e", 23_000, 45_000),
        poll_interval: Duration::from_secs(3600),
        retries: 0,
        ..SensorConfig::default()
    };
    let server = App::start(
        AppConfig::new(Mode::Server)
            .with_sensor(sensor)
            .with_displays(Vec::new())
            .with_web(Some(WebConfig::new("127.0.0.1", 0)))
            .with_ip_iface(""),
    )
    .await
    .unwrap();
    let server_addr = server.local_addr().unwrap();
    let server_reading = wait_for_capture(&server.store()).await;
    assert_eq!(server_reading.temperature(), 23.0);

    let metrics = reqwest::get(format!("http://{}/metrics", server_addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("pitemp_temperature_celsius 23"));

    let client = App::start(
        AppConfig::new(Mode::Client)
            .with_remote(Some(RemoteConfig::new(format!("http://{}/api", server_addr))))
            .with_displays(Vec::new())
            .with_web(None)
            .with_ip_iface(""),
    )
    .await
    .unwrap();
    let client_reading = wait_for_capture(&client.store()).await;
    assert_eq!(client_reading, server_reading);

    client.token().cancel();
    server.token().cancel();
    let client_summary = client.run().await;
    let server_summary = server.run().await;
    assert_eq!(client_summary.count(ActivityOutcome::Panicked), 0);
    assert_eq!(
        server_summary.outcome("web server"),
        Some(ActivityOutcome::Completed)
    );
}

#[test]
fn test_frame_clock_uses_local_time() {
    let now = Local.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
    let frame = Frame::new(Reading::default(), now, None, Duration::from_secs(180));
    assert_eq!(frame.clock(), "Mon Jan 2 15:04:05");
}
