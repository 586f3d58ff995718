//! Per-request driver and page router.
//!
//! [`AppService`] owns the stores shared by every request and walks each one
//! through its [`Request`] states: begin, stream the body, finalize, render
//! the page, complete. It has no knowledge of sockets, so it can be driven
//! directly in tests.

use super::request::{Followup, Method, Request, RequestContext};
use super::response::PageResponse;
use crate::clock::{Clock, SystemClock};
use crate::config_vars::{ConfigRegistry, HostConfig};
use crate::error::SetupError;
use crate::ids::SessionId;
use crate::pages::{self, ConfigField, WorkoutView};
use crate::router::{normalize_path, route, Route};
use crate::session::{Session, SessionStore};
use crate::workout::WorkoutStore;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Size of the buffer request bodies are read through.
pub const BODY_CHUNK_SIZE: usize = 512;

/// A request as seen by the service, independent of the network layer.
pub struct IncomingRequest<R> {
    pub method: Method,
    /// Raw request target, query string included
    pub url: String,
    /// Value of the session cookie, if the client sent one
    pub cookie: Option<String>,
    pub content_type: Option<String>,
    pub body: R,
}

impl IncomingRequest<io::Empty> {
    /// Body-less request, mostly for GETs in tests.
    pub fn get(url: &str, cookie: Option<&str>) -> Self {
        Self {
            method: Method::Get,
            url: url.to_string(),
            cookie: cookie.map(str::to_string),
            content_type: None,
            body: io::empty(),
        }
    }
}

pub struct AppService<C: Clock = SystemClock> {
    sessions: SessionStore,
    workouts: WorkoutStore,
    registry: Arc<ConfigRegistry>,
    clock: C,
}

impl AppService<SystemClock> {
    pub fn new(workouts: WorkoutStore, registry: Arc<ConfigRegistry>) -> Self {
        Self::with_clock(workouts, registry, SystemClock)
    }
}

impl<C: Clock> AppService<C> {
    pub fn with_clock(workouts: WorkoutStore, registry: Arc<ConfigRegistry>, clock: C) -> Self {
        Self {
            sessions: SessionStore::new(),
            workouts,
            registry,
            clock,
        }
    }

    /// Replace the session store, e.g. with one using a seeded generator.
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn workouts(&self) -> &WorkoutStore {
        &self.workouts
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Remove expired sessions; returns how many were dropped.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        self.sessions.sweep(now)
    }

    /// Time until the oldest idle session expires.
    pub fn next_expiry(&self) -> Option<Duration> {
        self.sessions.next_expiry(self.clock.now())
    }

    /// Process one request start to finish, reading the body from `incoming`.
    ///
    /// Every response binds the request's session cookie. The session is
    /// released before returning, whatever the outcome.
    pub fn handle<R: Read>(
        &mut self,
        incoming: IncomingRequest<R>,
        host: &mut dyn HostConfig,
    ) -> PageResponse {
        let IncomingRequest {
            method,
            url,
            cookie,
            content_type,
            mut body,
        } = incoming;

        let mut request = match self.open(
            method,
            &url,
            cookie.as_deref(),
            content_type.as_deref(),
            host,
        ) {
            Ok(request) => request,
            Err(response) => return response,
        };

        let mut buf = [0u8; BODY_CHUNK_SIZE];
        loop {
            match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    request.stream(&buf[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(path = request.path(), error = %e, "request body read failed");
                    return self.abort(request);
                }
            }
        }
        self.finish(request, host)
    }

    /// First sight of a request: attach its session and prepare ingestion.
    ///
    /// The returned [`Request`] is fed with [`Request::stream`] and closed
    /// with [`finish`](Self::finish) or [`abort`](Self::abort). A setup
    /// failure is answered right away and the request completed.
    pub fn open(
        &mut self,
        method: Method,
        url: &str,
        cookie: Option<&str>,
        content_type: Option<&str>,
        host: &mut dyn HostConfig,
    ) -> Result<Request, PageResponse> {
        let mut request = Request::new(method, normalize_path(url).into_owned());
        request.begin(cookie, content_type, &mut self.context(host));
        match request.failure().map(setup_failure) {
            Some(response) => Err(self.close(request, response)),
            None => Ok(request),
        }
    }

    /// The body is fully consumed: finalize and render the answering page.
    pub fn finish(&mut self, mut request: Request, host: &mut dyn HostConfig) -> PageResponse {
        let response = {
            let mut ctx = self.context(host);
            match (request.finalize(&mut ctx), request.session().cloned()) {
                (Some(followup), Some(session)) => {
                    let response = render_page(&mut ctx, &followup, &session);
                    request.mark_done();
                    response
                }
                _ => PageResponse::internal_error(),
            }
        };
        self.close(request, response)
    }

    /// The body could not be read. Nothing ingested so far is applied.
    pub fn abort(&mut self, mut request: Request) -> PageResponse {
        request.abort();
        self.close(request, PageResponse::internal_error())
    }

    fn close(&mut self, request: Request, mut response: PageResponse) -> PageResponse {
        if response.cookie.is_none() {
            response.cookie = request.session().cloned();
        }
        request.complete(&mut self.sessions);
        response
    }

    fn context<'a>(&'a mut self, host: &'a mut dyn HostConfig) -> RequestContext<'a> {
        RequestContext {
            sessions: &mut self.sessions,
            workouts: &self.workouts,
            registry: &self.registry,
            host,
            clock: &self.clock,
        }
    }
}

fn setup_failure(err: &SetupError) -> PageResponse {
    match err.status() {
        404 => PageResponse::not_found(),
        500 => PageResponse::internal_error(),
        status => PageResponse::error(status, pages::METHOD_ERROR),
    }
}

/// Generate the page for `followup`, consuming the session's one-shot message.
fn render_page(
    ctx: &mut RequestContext<'_>,
    followup: &Followup,
    session: &SessionId,
) -> PageResponse {
    if !followup.method.is_read() {
        debug!(method = ?followup.method, path = %followup.path, "method not accepted");
        return PageResponse::not_acceptable();
    }

    let page = route(&followup.path);
    if page == Route::NotFound {
        debug!(path = %followup.path, "no page");
        return PageResponse::not_found();
    }

    let message = ctx
        .sessions
        .get_mut(session)
        .and_then(Session::take_message);
    let message = message.as_deref();

    let rendered = match page {
        Route::Config => match config_fields(ctx) {
            Ok(fields) => pages::config_form(message, &fields),
            Err(resp) => return resp,
        },
        Route::Review => match ctx.workouts.list() {
            Ok(ids) => pages::review_list(&ids, None),
            Err(e) => {
                warn!(dir = %ctx.workouts.data_dir().display(), error = %e, "cannot list workouts");
                pages::review_list(&[], Some("Unable to read workout directory"))
            }
        },
        Route::Workout(None) => pages::workout_detail(message, WorkoutView::MissingId),
        Route::Workout(Some(id)) => match ctx.workouts.load(&id) {
            Ok(timer) => pages::workout_detail(message, WorkoutView::Loaded(&id, &timer)),
            Err(e) => {
                warn!(workout = %id, error = %e, "cannot load workout");
                pages::workout_detail(message, WorkoutView::Failed(&id, "Unable to load workout"))
            }
        },
        Route::NotFound => return PageResponse::not_found(),
    };

    match rendered {
        Ok(body) => PageResponse::page(body, session),
        Err(e) => {
            error!(path = %followup.path, error = %e, "page rendering failed");
            PageResponse::internal_error()
        }
    }
}

fn config_fields(ctx: &RequestContext<'_>) -> Result<Vec<ConfigField>, PageResponse> {
    ctx.registry
        .vars()
        .iter()
        .map(|var| match ctx.host.read_value(var) {
            Ok(value) => Ok(ConfigField {
                label: var.lookup_name.clone(),
                is_password: var.is_password,
                value,
            }),
            Err(e) => {
                error!(var = %var.lookup_name, error = %e, "cannot read configuration value");
                Err(PageResponse::internal_error())
            }
        })
        .collect()
}
