//! Reactor loop and start/stop control.
//!
//! The daemon runs on the thread that calls [`HttpDaemon::start`]. Sessions,
//! requests and workouts are only ever touched there. Sockets are not: a
//! listener thread accepts exchanges and hands each one to a connection
//! thread, which reads the body and forwards it in chunks as [`Event`]s. The
//! reactor steps one [`Request`] state machine per open exchange, so
//! exchanges interleave at chunk granularity and a stalled client holds up
//! nobody but itself.
//!
//! Each iteration sweeps expired sessions, waits for the next event (bounded
//! by the poll interval and the next session expiry), checks the stop flag,
//! then handles every event that is ready.

use super::request::{Method, Request};
use super::response::{cookie_value, PageResponse, COOKIE_NAME};
use super::service::{AppService, BODY_CHUNK_SIZE};
use crate::clock::{Clock, SystemClock};
use crate::config_vars::HostConfig;
use crate::error::DaemonError;
use crate::runtime_config::ServerSettings;
use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::Server;
use tracing::{debug, info, warn};

/// Events buffered between connection threads and the reactor.
const EVENT_QUEUE_DEPTH: usize = 64;

/// Start/stop control shared between the reactor and its host.
///
/// Cloning yields another handle to the same daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonHandle {
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl DaemonHandle {
    /// Ask the reactor to exit. Observed once per loop iteration.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// The flag [`stop`](Self::stop) sets, for signal handlers.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

pub struct HttpDaemon<C: Clock = SystemClock> {
    addr: String,
    poll_interval: Duration,
    service: AppService<C>,
    handle: DaemonHandle,
}

impl<C: Clock> HttpDaemon<C> {
    pub fn new(settings: &ServerSettings, service: AppService<C>) -> Self {
        Self {
            addr: settings.addr.clone(),
            poll_interval: settings.poll_interval,
            service,
            handle: DaemonHandle::default(),
        }
    }

    /// Share run/stop state with an existing handle.
    pub fn with_handle(mut self, handle: DaemonHandle) -> Self {
        self.handle = handle;
        self
    }

    pub fn handle(&self) -> DaemonHandle {
        self.handle.clone()
    }

    pub fn service(&self) -> &AppService<C> {
        &self.service
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Bind the listener and run the reactor until stopped.
    ///
    /// Returns immediately with `Ok(())` if the daemon behind this handle is
    /// already running. A stop requested before the call is discarded.
    pub fn start(&mut self, host: &mut dyn HostConfig) -> Result<(), DaemonError> {
        if self
            .handle
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(addr = %self.addr, "daemon already running");
            return Ok(());
        }
        self.handle.stop.store(false, Ordering::SeqCst);

        let result = self.serve(host);
        self.handle.running.store(false, Ordering::SeqCst);
        result
    }

    fn serve(&mut self, host: &mut dyn HostConfig) -> Result<(), DaemonError> {
        let server = Server::http(self.addr.as_str()).map_err(|e| DaemonError::Bind {
            addr: self.addr.clone(),
            reason: e.to_string(),
        })?;
        let (events_tx, events) = mpsc::sync_channel(EVENT_QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let listener = spawn_listener(server, events_tx, Arc::clone(&shutdown), self.poll_interval)?;
        info!(addr = %self.addr, poll_ms = self.poll_interval.as_millis() as u64, "daemon started");

        let mut exchanges = HashMap::new();
        self.run(&events, &mut exchanges, host);

        // Exchanges still streaming are abandoned; their sessions are released.
        for (conn, exchange) in exchanges.drain() {
            debug!(conn, path = exchange.request.path(), "abandoning open exchange");
            self.service.abort(exchange.request);
        }
        shutdown.store(true, Ordering::SeqCst);
        drop(events);
        if listener.join().is_err() {
            warn!("listener thread panicked");
        }

        info!(addr = %self.addr, "daemon stopped");
        Ok(())
    }

    fn run(
        &mut self,
        events: &Receiver<Event>,
        exchanges: &mut HashMap<u64, Exchange>,
        host: &mut dyn HostConfig,
    ) {
        loop {
            let swept = self.service.sweep();
            if swept > 0 {
                debug!(swept, remaining = self.service.sessions().len(), "expired sessions removed");
            }

            let timeout = self
                .service
                .next_expiry()
                .map_or(self.poll_interval, |expiry| expiry.min(self.poll_interval));

            let received = events.recv_timeout(timeout);
            if self.handle.stop_requested() {
                return;
            }

            match received {
                Ok(event) => {
                    self.dispatch(event, exchanges, host);
                    while let Ok(event) = events.try_recv() {
                        self.dispatch(event, exchanges, host);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("listener thread exited unexpectedly");
                    return;
                }
            }
        }
    }

    fn dispatch(
        &mut self,
        event: Event,
        exchanges: &mut HashMap<u64, Exchange>,
        host: &mut dyn HostConfig,
    ) {
        match event {
            Event::Opened { conn, head, reply } => {
                debug!(conn, method = ?head.method, url = %head.url, "request received");
                match self.service.open(
                    head.method,
                    &head.url,
                    head.cookie.as_deref(),
                    head.content_type.as_deref(),
                    host,
                ) {
                    Ok(request) => {
                        exchanges.insert(conn, Exchange { request, reply });
                    }
                    Err(response) => send_reply(conn, &reply, response),
                }
            }
            Event::Body { conn, chunk } => {
                if let Some(exchange) = exchanges.get_mut(&conn) {
                    exchange.request.stream(&chunk);
                }
            }
            Event::End { conn } => {
                if let Some(Exchange { request, reply }) = exchanges.remove(&conn) {
                    let response = self.service.finish(request, host);
                    send_reply(conn, &reply, response);
                }
            }
            Event::Failed { conn, error } => {
                if let Some(Exchange { request, reply }) = exchanges.remove(&conn) {
                    warn!(conn, path = request.path(), error = %error, "request body read failed");
                    let response = self.service.abort(request);
                    send_reply(conn, &reply, response);
                }
            }
        }
    }
}

/// Request line and headers the reactor needs.
#[derive(Debug)]
struct Head {
    method: Method,
    url: String,
    cookie: Option<String>,
    content_type: Option<String>,
}

impl Head {
    fn of(request: &tiny_http::Request) -> Self {
        let cookie = request
            .headers()
            .iter()
            .filter(|h| h.field.equiv("Cookie"))
            .find_map(|h| cookie_value(h.value.as_str(), COOKIE_NAME))
            .map(str::to_string);
        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Content-Type"))
            .map(|h| h.value.as_str().to_string());
        Self {
            method: Method::parse(request.method().as_str()),
            url: request.url().to_string(),
            cookie,
            content_type,
        }
    }
}

/// What a connection thread reports about its exchange, in order.
#[derive(Debug)]
enum Event {
    Opened {
        conn: u64,
        head: Head,
        reply: SyncSender<PageResponse>,
    },
    Body {
        conn: u64,
        chunk: Vec<u8>,
    },
    End {
        conn: u64,
    },
    Failed {
        conn: u64,
        error: io::Error,
    },
}

/// An exchange whose body is still arriving.
struct Exchange {
    request: Request,
    reply: SyncSender<PageResponse>,
}

fn send_reply(conn: u64, reply: &SyncSender<PageResponse>, response: PageResponse) {
    if reply.send(response).is_err() {
        debug!(conn, "connection closed before its response was ready");
    }
}

/// Accept exchanges until `shutdown` is set, one connection thread each.
fn spawn_listener(
    server: Server,
    events: SyncSender<Event>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("workout-httpd-listener".to_string())
        .spawn(move || {
            let mut next_conn: u64 = 0;
            while !shutdown.load(Ordering::SeqCst) {
                match server.recv_timeout(poll) {
                    Ok(Some(request)) => {
                        next_conn += 1;
                        let conn = next_conn;
                        let events = events.clone();
                        let spawned = thread::Builder::new()
                            .name(format!("workout-httpd-conn-{}", conn))
                            .spawn(move || serve_connection(conn, request, &events));
                        if let Err(e) = spawned {
                            warn!(conn, error = %e, "failed to spawn connection thread");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "waiting for requests failed"),
                }
            }
        })
}

/// Read one exchange's body, forward it, then send the reactor's answer.
///
/// Returns early once the reactor has gone away.
fn serve_connection(conn: u64, mut request: tiny_http::Request, events: &SyncSender<Event>) {
    let (reply, response) = mpsc::sync_channel(1);
    let head = Head::of(&request);
    if events.send(Event::Opened { conn, head, reply }).is_err() {
        return;
    }

    let mut body = request.as_reader();
    let mut buf = [0u8; BODY_CHUNK_SIZE];
    let last = loop {
        match body.read(&mut buf) {
            Ok(0) => break Event::End { conn },
            Ok(n) => {
                let chunk = buf[..n].to_vec();
                if events.send(Event::Body { conn, chunk }).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => break Event::Failed { conn, error },
        }
    };
    if events.send(last).is_err() {
        return;
    }

    let Ok(response) = response.recv() else {
        return;
    };
    let status = response.status;
    if let Err(e) = request.respond(response.into_http()) {
        warn!(conn, status, error = %e, "failed to send response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_flags() {
        let handle = DaemonHandle::default();
        assert!(!handle.is_running());
        assert!(!handle.stop_requested());
        let clone = handle.clone();
        clone.stop();
        assert!(handle.stop_requested());
        assert!(handle.stop_flag().load(Ordering::SeqCst));
    }
}
