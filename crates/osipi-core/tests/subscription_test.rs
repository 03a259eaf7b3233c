#![allow(clippy::unwrap_used)]
// Change-detection tests driven by real stream reads against wiremock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value as Json, json};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use osipi_core::{
    AuthCredentials, ConnectionConfig, Payload, Point, StreamArgs, StreamKind, WebApi, connect,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, WebApi, Arc<Point>) {
    let server = MockServer::start().await;
    let base = format!("{}/piwebapi", server.uri());

    Mock::given(method("GET"))
        .and(path("/piwebapi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Links": { "Self": format!("{base}/"), "Search": format!("{base}/search") }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/piwebapi/search/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "TotalHits": 1,
            "Items": [{
                "WebId": "P0sin",
                "Name": "SINUSOID",
                "PointClass": "classic",
                "PointType": "Float32",
                "Links": {
                    "Self": format!("{base}/points/P0sin"),
                    "Value": format!("{base}/streams/P0sin/value")
                }
            }]
        })))
        .mount(&server)
        .await;

    let config = ConnectionConfig::new(Url::parse(&base).unwrap(), AuthCredentials::Anonymous);
    let api = connect(&config).await.unwrap();
    let point = api.points("name:sinusoid", None).await.unwrap().remove(0);
    (server, api, point)
}

fn snapshot(ts: &str, value: f64) -> Json {
    json!({ "Timestamp": ts, "Value": value, "Good": true })
}

/// Serve `first` for `times` requests, then `then` forever.
async fn mount_sequence(server: &MockServer, url_path: &str, first: Json, times: u64, then: Json) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(first))
        .up_to_n_times(times)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(then))
        .mount(server)
        .await;
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(&Point) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    (count, move |_: &Point| {
        inner.fetch_add(1, Ordering::SeqCst);
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_current_fires_on_first_read_and_on_change_only() {
    let (server, api, point) = setup().await;
    mount_sequence(
        &server,
        "/piwebapi/streams/P0sin/value",
        snapshot("2017-05-16T07:00:00Z", 10.0),
        2,
        snapshot("2017-05-16T07:05:00Z", 11.0),
    )
    .await;

    let (count, cb) = counter();
    let subs = api.subscribe([&point], StreamKind::Current, cb, StreamArgs::default());
    assert_eq!(subs.len(), 1);

    let mut fired = Vec::new();
    for _ in 0..3 {
        let before = count.load(Ordering::SeqCst);
        point.current(None).await.unwrap();
        fired.push(count.load(Ordering::SeqCst) - before);
    }
    assert_eq!(fired, vec![1, 0, 1]);
}

#[tokio::test]
async fn test_callback_sees_refreshed_value() {
    let (server, api, point) = setup().await;
    mount_sequence(
        &server,
        "/piwebapi/streams/P0sin/value",
        snapshot("2017-05-16T07:00:00Z", 10.0),
        1,
        snapshot("2017-05-16T07:05:00Z", 11.0),
    )
    .await;

    let seen: Arc<Mutex<Vec<Payload>>> = Arc::default();
    let sink = Arc::clone(&seen);
    api.subscribe(
        [&point],
        StreamKind::Current,
        move |p: &Point| {
            let value = p.current_value().unwrap();
            sink.lock().unwrap().push(value.payload().clone());
        },
        StreamArgs::default(),
    );

    point.current(None).await.unwrap();
    point.current(None).await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Payload::Float(10.0), Payload::Float(11.0)]
    );
}

#[tokio::test]
async fn test_unsubscribe_silences_callbacks() {
    let (server, api, point) = setup().await;
    mount_sequence(
        &server,
        "/piwebapi/streams/P0sin/value",
        snapshot("2017-05-16T07:00:00Z", 10.0),
        1,
        snapshot("2017-05-16T07:05:00Z", 11.0),
    )
    .await;

    let (count, cb) = counter();
    api.subscribe([&point], StreamKind::Current, cb, StreamArgs::default());
    point.current(None).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    assert_eq!(api.unsubscribe([&point], StreamKind::Current), 1);
    point.current(None).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_stream_is_independent_of_current() {
    let (server, api, point) = setup().await;
    Mock::given(method("GET"))
        .and(path("/piwebapi/streams/P0sin/value"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(snapshot("2017-05-16T07:00:00Z", 10.0)),
        )
        .mount(&server)
        .await;

    let (count, cb) = counter();
    api.subscribe([&point], StreamKind::End, cb, StreamArgs::default());
    point.current(None).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_interpolated_at_times_notifies_per_timestamp() {
    let (server, api, point) = setup().await;

    let t1 = "2017-05-16T07:00:00Z";
    let t2 = "2017-05-16T08:00:00Z";
    let body = |v1: f64, v2: f64| json!({ "Items": [snapshot(t1, v1), snapshot(t2, v2)] });

    // Only the value at t1 changes on the second read.
    mount_sequence(
        &server,
        "/piwebapi/streams/P0sin/interpolatedattimes",
        body(1.0, 2.0),
        1,
        body(1.5, 2.0),
    )
    .await;

    let (at_t1, cb1) = counter();
    let (at_t2, cb2) = counter();
    api.subscribe([&point], StreamKind::InterpolatedAtTimes, cb1, StreamArgs::at(t1));
    api.subscribe([&point], StreamKind::InterpolatedAtTimes, cb2, StreamArgs::at(t2));

    point.interpolated_at_times(&[t1, t2]).await.unwrap();
    point.interpolated_at_times(&[t1, t2]).await.unwrap();

    assert_eq!(at_t1.load(Ordering::SeqCst), 2);
    assert_eq!(at_t2.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_many_points_share_one_callback() {
    let (server, api, point) = setup().await;
    Mock::given(method("GET"))
        .and(path("/piwebapi/streams/P0sin/value"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(snapshot("2017-05-16T07:00:00Z", 10.0)),
        )
        .mount(&server)
        .await;

    let (count, cb) = counter();
    let points = vec![Arc::clone(&point), point];
    let subs = api.subscribe(&points, StreamKind::Current, cb, StreamArgs::default());
    assert_eq!(subs.len(), 2);

    // Both registrations share the (point, stream) key and fire together.
    points[0].current(None).await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_distinct_points_fire_once_each() {
    let (server, api, sinusoid) = setup().await;
    let base = format!("{}/piwebapi", server.uri());

    Mock::given(method("GET"))
        .and(path("/piwebapi/points"))
        .and(query_param("path", "\\\\PISRV1\\CDT158"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "WebId": "P0cdt",
            "Name": "CDT158",
            "PointClass": "classic",
            "PointType": "Float32",
            "Links": {
                "Self": format!("{base}/points/P0cdt"),
                "Value": format!("{base}/streams/P0cdt/value")
            }
        })))
        .mount(&server)
        .await;
    for web_id in ["P0sin", "P0cdt"] {
        Mock::given(method("GET"))
            .and(path(format!("/piwebapi/streams/{web_id}/value")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(snapshot("2017-05-16T07:00:00Z", 10.0)),
            )
            .mount(&server)
            .await;
    }

    let cdt158 = api.point_by_path("\\\\PISRV1\\CDT158").await.unwrap();
    assert_ne!(sinusoid.web_id(), cdt158.web_id());

    let fired: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&fired);
    let subs = api.subscribe(
        [&sinusoid, &cdt158],
        StreamKind::Current,
        move |p: &Point| sink.lock().unwrap().push(p.name().to_owned()),
        StreamArgs::default(),
    );
    assert_eq!(subs.len(), 2);

    for point in [&sinusoid, &cdt158] {
        point.current(None).await.unwrap();
    }
    assert_eq!(*fired.lock().unwrap(), vec!["SINUSOID", "CDT158"]);

    // Unchanged values on the next pass stay silent.
    for point in [&sinusoid, &cdt158] {
        point.current(None).await.unwrap();
    }
    assert_eq!(fired.lock().unwrap().len(), 2);
}
