//! Reactor loop over real sockets.

mod common;

use common::{form_body, write_workout, TWO_LEG_WORKOUT, WORKOUT_ID};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use workout_httpd::{
    AppService, ConfigRegistry, DaemonError, DaemonHandle, HttpDaemon, JsonProfileHost,
    ServerSettings, WorkoutStore,
};

struct Running {
    handle: DaemonHandle,
    thread: JoinHandle<Result<(), DaemonError>>,
    addr: SocketAddr,
}

impl Running {
    fn shutdown(self) {
        self.handle.stop();
        self.thread.join().unwrap().unwrap();
        assert!(!self.handle.is_running());
    }
}

fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn settings(addr: SocketAddr, data_dir: &Path) -> ServerSettings {
    ServerSettings {
        addr: addr.to_string(),
        data_dir: data_dir.to_path_buf(),
        poll_interval: Duration::from_millis(20),
    }
}

fn start_daemon(data_dir: &Path, config_dir: &Path) -> Running {
    let addr = free_addr();
    let handle = DaemonHandle::default();
    let shared = handle.clone();
    let settings = settings(addr, data_dir);
    let config_dir = config_dir.to_path_buf();

    let thread = std::thread::spawn(move || {
        let mut host = JsonProfileHost::new(config_dir);
        let service = AppService::new(
            WorkoutStore::new(&settings.data_dir),
            Arc::new(ConfigRegistry::default()),
        );
        let mut daemon = HttpDaemon::new(&settings, service).with_handle(shared);
        daemon.start(&mut host)
    });

    for _ in 0..200 {
        if handle.is_running() && TcpStream::connect(addr).is_ok() {
            return Running {
                handle,
                thread,
                addr,
            };
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("daemon did not come up on {}", addr);
}

fn send_request(addr: &SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream.write_all(req.as_bytes()).unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).unwrap();
    String::from_utf8_lossy(&buf).to_string()
}

fn parse_response(resp: &str) -> (u16, Vec<(String, String)>, String) {
    let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    (status, headers, body.to_string())
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn session_cookie(headers: &[(String, String)]) -> String {
    let set_cookie = header(headers, "set-cookie").expect("set-cookie header");
    let pair = set_cookie.split(';').next().unwrap();
    pair.strip_prefix("session=").unwrap().to_string()
}

#[test]
fn test_get_binds_session_cookie() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let running = start_daemon(data.path(), config.path());

    let resp = send_request(
        &running.addr,
        "GET /config HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    running.shutdown();

    let (status, headers, body) = parse_response(&resp);
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "content-type"), Some("text/html; charset=utf-8"));
    let cookie = header(&headers, "set-cookie").unwrap();
    assert!(cookie.ends_with("; Path=/; HttpOnly"));
    assert_eq!(session_cookie(&headers).len(), 32);
    assert!(body.contains("FastRunningFriend Configuration"));
}

#[test]
fn test_config_post_persists_default_profile() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let running = start_daemon(data.path(), config.path());

    let first = send_request(
        &running.addr,
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let (_, headers, _) = parse_response(&first);
    let sid = session_cookie(&headers);

    let body = form_body(&[("apiKey", "secret123"), ("units", "km")]);
    let req = format!(
        "POST /config HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nCookie: session={}\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        sid,
        body.len(),
        body
    );
    let resp = send_request(&running.addr, &req);
    running.shutdown();

    let (status, headers, page) = parse_response(&resp);
    assert_eq!(status, 200);
    assert_eq!(session_cookie(&headers), sid);
    assert!(page.contains("Configuration data updated"));

    let saved = std::fs::read_to_string(config.path().join("default.json")).unwrap();
    let saved: serde_json::Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(saved["api_key"], "secret123");
    assert_eq!(saved["units"], "km");
    let reloaded = JsonProfileHost::load(config.path()).unwrap();
    assert_eq!(reloaded.value("api_key"), Some("secret123"));
}

#[test]
fn test_workout_edit_over_http() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    write_workout(data.path(), WORKOUT_ID, TWO_LEG_WORKOUT);
    let running = start_daemon(data.path(), config.path());

    let body = form_body(&[("d_0_1", "2.0")]);
    let req = format!(
        "POST /workout/{} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        WORKOUT_ID,
        body.len(),
        body
    );
    let resp = send_request(&running.addr, &req);
    running.shutdown();

    let (status, _, page) = parse_response(&resp);
    assert_eq!(status, 200);
    assert!(page.contains("Workout updated"));
    let written = std::fs::read_to_string(data.path().join(format!("{}.csv", WORKOUT_ID))).unwrap();
    assert_eq!(written, "100,1,250,3\n450,3.8\n");
}

#[test]
fn test_status_codes() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let running = start_daemon(data.path(), config.path());

    let not_found = send_request(
        &running.addr,
        "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let bad_method = send_request(
        &running.addr,
        "DELETE /config HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let head = send_request(
        &running.addr,
        "HEAD /review HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    running.shutdown();

    let (status, _, body) = parse_response(&not_found);
    assert_eq!(status, 404);
    assert!(body.contains("Page not found."));
    let (status, _, body) = parse_response(&bad_method);
    assert_eq!(status, 406);
    assert!(body.contains("Error in request."));
    let (status, headers, body) = parse_response(&head);
    assert_eq!(status, 200);
    assert!(header(&headers, "set-cookie").is_some());
    assert!(body.is_empty());
}

#[test]
fn test_start_is_noop_while_running() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let running = start_daemon(data.path(), config.path());

    // Same handle, same address: a second start must not try to bind.
    let service = AppService::new(
        WorkoutStore::new(data.path()),
        Arc::new(ConfigRegistry::default()),
    );
    let mut second =
        HttpDaemon::new(&settings(running.addr, data.path()), service).with_handle(running.handle.clone());
    let mut host = JsonProfileHost::new(config.path());
    assert!(second.start(&mut host).is_ok());
    assert!(running.handle.is_running());

    running.shutdown();
}

#[test]
fn test_bind_failure_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let data = tempfile::tempdir().unwrap();
    let service = AppService::new(
        WorkoutStore::new(data.path()),
        Arc::new(ConfigRegistry::default()),
    );
    let mut daemon = HttpDaemon::new(&settings(addr, data.path()), service);
    let mut host = JsonProfileHost::new(data.path());
    assert!(matches!(
        daemon.start(&mut host),
        Err(DaemonError::Bind { .. })
    ));
    assert!(!daemon.is_running());
    drop(listener);
}

#[test]
fn test_stalled_upload_does_not_block_reactor() {
    let data = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let running = start_daemon(data.path(), config.path());

    // Announces a large body, sends a few bytes, then goes quiet.
    let mut stalled = TcpStream::connect(running.addr).unwrap();
    stalled
        .write_all(
            b"POST /config HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 100000\r\n\r\nunits",
        )
        .unwrap();
    std::thread::sleep(Duration::from_millis(100));

    let resp = send_request(
        &running.addr,
        "GET /review HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    let (status, _, body) = parse_response(&resp);
    assert_eq!(status, 200);
    assert!(body.contains("Workout Review"));

    let Running { handle, thread, .. } = running;
    handle.stop();
    let (done_tx, done_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = done_tx.send(thread.join());
    });
    let joined = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("reactor did not stop while an upload was stalled");
    assert!(joined.unwrap().is_ok());
    assert!(!handle.is_running());
    drop(stalled);
}
