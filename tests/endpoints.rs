use hyper::{header::CONTENT_TYPE, Body, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};
use tour::{app, config::AppConfig, DOCS_PATH};
use tour_core::{handler::Service, response::body_to_bytes, route::Router, server::Server};

fn send(router: &Router, method: Method, uri: &str, body: Body) -> anyhow::Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri).body(body)?;
    let response = router.call(request);
    let status = response.status();

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .map(|v| v.to_str().unwrap_or_default().to_owned());
    assert_eq!(content_type.as_deref(), Some("application/json"), "{}", uri);

    let bytes = body_to_bytes(response.into_body())?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn get(router: &Router, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
    send(router, Method::GET, uri, Body::empty())
}

/// Percent-encodes every byte that is not alphanumeric.
fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}

fn test_uri(values: &[&str]) -> String {
    let query: Vec<String> = values.iter().map(|v| format!("q={}", encode(v))).collect();
    format!("/test?{}", query.join("&"))
}

/// Serves `router` on an ephemeral port, returns base URL.
fn spawn_upstream(router: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || Server::new("127.0.0.1", addr.port()).with_service(router).serve(listener));
    Ok(format!("http://{}", addr))
}

#[test]
fn test_root() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    assert_eq!(
        get(&app, "/")?,
        (StatusCode::OK, json!({"Message": "Hello World!"}))
    );
    Ok(())
}

#[test]
fn test_read_item() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    assert_eq!(
        get(&app, "/items/5?q=somequery")?,
        (StatusCode::OK, json!({"item_id": 5, "q": "somequery"}))
    );
    assert_eq!(
        get(&app, "/items/-3")?,
        (StatusCode::OK, json!({"item_id": -3, "q": null}))
    );

    // Repeated `q`, last one wins.
    assert_eq!(
        get(&app, "/items/5?q=a&q=b")?,
        (StatusCode::OK, json!({"item_id": 5, "q": "b"}))
    );

    let (status, body) = get(&app, "/items/foo")?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap_or_default().contains("item_id"));
    Ok(())
}

#[test]
fn test_update_item() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    let body = Body::from(r#"{"name": "Hammer", "price": 9.5, "is_offer": true}"#);
    assert_eq!(
        send(&app, Method::PUT, "/items/7", body)?,
        (
            StatusCode::OK,
            json!({"item_name": "Hammer", "is_now": 9.5, "item_id": 7})
        )
    );

    let body = Body::from(r#"{"name": "Nail", "price": 0.1}"#);
    let (status, _) = send(&app, Method::PUT, "/items/8", body)?;
    assert_eq!(status, StatusCode::OK);

    let cases = [
        ("/items/7", r#"{"name": "Hammer"}"#),
        ("/items/7", "not json"),
        ("/items/7", ""),
        ("/items/x", r#"{"name": "Hammer", "price": 1}"#),
    ];
    for (uri, body) in cases {
        let (status, _) = send(&app, Method::PUT, uri, Body::from(body))?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{} {}", uri, body);
    }
    Ok(())
}

#[test]
fn test_read_query() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    assert_eq!(
        get(&app, "/query?b=1&a=x&b=2&c=hello%20world")?,
        (
            StatusCode::OK,
            json!({"params": {"a": ["x"], "b": ["1", "2"], "c": ["hello world"]}})
        )
    );
    assert_eq!(get(&app, "/query")?, (StatusCode::OK, json!({"params": {}})));
    Ok(())
}

#[test]
fn test_decode_query() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    let cases = [
        (
            vec![r#"{"status": "true"}"#],
            json!({"q": [{"status": "true"}]}),
        ),
        (
            vec![r#"{"a":1}"#, r#"{"a":1}"#],
            json!({"q": [{"a": 1}, {"a": 1}]}),
        ),
        (vec![r#"{"x": [1,2,3]}"#], json!({"q": [{"x": [1, 2, 3]}]})),
        (vec!["3", "[]", "null"], json!({"q": [3, [], null]})),
    ];

    for (values, expected) in cases {
        assert_eq!(
            get(&app, &test_uri(&values))?,
            (StatusCode::OK, expected),
            "{:?}",
            values
        );
    }

    // Other keys are ignored.
    assert_eq!(
        get(&app, &format!("{}&other=1", test_uri(&["true"])))?,
        (StatusCode::OK, json!({"q": [true]}))
    );
    Ok(())
}

#[test]
fn test_decode_query_rejections() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    let (status, body) = get(&app, "/test")?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].as_str().unwrap_or_default().contains("`q`"));

    let (status, body) = get(&app, &test_uri(&["{}", "not json"]))?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"]
        .as_str()
        .unwrap_or_default()
        .contains("position 1"));
    Ok(())
}

#[test]
fn test_decode_query_limits() -> anyhow::Result<()> {
    let config = AppConfig::from_lookup(|key| match key {
        "APP_MAX_DOCUMENT_BYTES" => Some("16".to_string()),
        "APP_MAX_DOCUMENT_DEPTH" => Some("2".to_string()),
        _ => None,
    })?;
    let app = app(&config);

    assert_eq!(
        get(&app, &test_uri(&["[[1]]"]))?,
        (StatusCode::OK, json!({"q": [[[1]]]}))
    );

    for values in [vec!["[[[1]]]"], vec!["1", r#""a much longer string""#]] {
        let (status, _) = get(&app, &test_uri(&values))?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{:?}", values);
    }
    Ok(())
}

#[test]
fn test_unmatched() -> anyhow::Result<()> {
    let app = app(&AppConfig::default());

    assert_eq!(
        get(&app, "/nothing/here")?,
        (StatusCode::NOT_FOUND, json!({"detail": "Not Found"}))
    );
    assert_eq!(
        send(&app, Method::DELETE, "/items/1", Body::empty())?,
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"detail": "Method Not Allowed"})
        )
    );
    assert_eq!(
        send(&app, Method::POST, DOCS_PATH, Body::empty())?,
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"detail": "Method Not Allowed"})
        )
    );
    Ok(())
}

#[test]
fn test_docs() -> anyhow::Result<()> {
    let config = AppConfig::from_lookup(|key| match key {
        "APP_NAME" => Some("Tutorial".to_string()),
        "APP_DESCRIPTION" => Some("Example endpoints".to_string()),
        "APP_VERSION" => Some("1.2.3".to_string()),
        _ => None,
    })?;
    let (status, doc) = get(&app(&config), DOCS_PATH)?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        doc["info"],
        json!({"title": "Tutorial", "description": "Example endpoints", "version": "1.2.3"})
    );

    let paths = doc["paths"].as_object().expect("paths");
    let mut names: Vec<&str> = paths.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(
        names,
        ["/", "/items/{item_id}", "/query", "/test", "/uuid"]
    );

    let item = &paths["/items/{item_id}"];
    assert_eq!(item["get"]["summary"], "Read Item");
    assert_eq!(item["put"]["summary"], "Update Item");
    assert_eq!(item["put"]["parameters"][0]["name"], "item_id");
    Ok(())
}

#[test]
fn test_uuid_proxy() -> anyhow::Result<()> {
    let upstream = Router::default()
        .get("/uuid", || {
            tour_core::request::Json(json!({"uuid": "9d4c1c4e-3a3f-4d63-9a49-5a8f2b5e2f11"}))
        })
        .get("/text", || "not json")
        .get("/fail", || (StatusCode::INTERNAL_SERVER_ERROR, "boom"));
    let base = spawn_upstream(upstream)?;

    let config = |path: &str| {
        AppConfig::from_lookup(|key| match key {
            "APP_UUID_URL" => Some(format!("{}{}", base, path)),
            "APP_UPSTREAM_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
    };

    assert_eq!(
        get(&app(&config("/uuid")?), "/uuid")?,
        (
            StatusCode::OK,
            json!({"uuid": "9d4c1c4e-3a3f-4d63-9a49-5a8f2b5e2f11"})
        )
    );

    for path in ["/text", "/fail", "/missing"] {
        let (status, _) = get(&app(&config(path)?), "/uuid")?;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{}", path);
    }
    Ok(())
}

#[test]
fn test_uuid_proxy_unreachable() -> anyhow::Result<()> {
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let config = AppConfig::from_lookup(|key| match key {
        "APP_UUID_URL" => Some(format!("http://127.0.0.1:{}/uuid", port)),
        "APP_UPSTREAM_TIMEOUT_SECS" => Some("2".to_string()),
        _ => None,
    })?;

    let (status, body) = get(&app(&config), "/uuid")?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({"detail": "upstream unreachable"}));
    Ok(())
}

/// Sends raw request to `app` served over TCP, returns whole response.
fn send_over_tcp(config: &AppConfig, raw: &str) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = Server::new("127.0.0.1", addr.port())
        .with_config(config.server_config())
        .with_service(app(config));
    thread::spawn(move || server.serve(listener));

    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    stream.write_all(raw.as_bytes())?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

#[test]
fn test_decode_query_near_size_limit_over_tcp() -> anyhow::Result<()> {
    let config = AppConfig::default();
    let limit = config.decode_limits.max_bytes;

    let document = format!("\"{}\"", "a".repeat(limit - 16));
    let raw = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", test_uri(&[&document]));
    let response = send_over_tcp(&config, &raw)?;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{:.200}", response);
    assert!(response.ends_with(&format!("{{\"q\":[{}]}}", document)));

    let document = format!("\"{}\"", "a".repeat(limit + 16));
    let raw = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", test_uri(&[&document]));
    let response = send_over_tcp(&config, &raw)?;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{:.200}", response);
    assert!(response.contains("limit is 65536"), "{}", response);
    Ok(())
}
