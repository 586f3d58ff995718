//! # Request State Machine
//!
//! One [`Request`] exists per HTTP exchange. It is created when the exchange
//! is first seen, fed the body piece by piece, finalized once the body is
//! consumed, and completed when the network layer is done with it:
//!
//! ```text
//! New --begin--> Streaming --stream*--> Streaming --finalize--> Finalizing --mark_done--> Done
//!  \________________________ setup failure ________________________________> Aborted
//! ```
//!
//! [`Request::complete`] consumes the request, so the session reference it
//! holds is released exactly once whichever state it ended in.

use crate::clock::Clock;
use crate::config_vars::{self, ConfigRegistry, HostConfig};
use crate::error::SetupError;
use crate::form::{ConfigIngest, FormDecoder, Ingest, WorkoutIngest};
use crate::ids::SessionId;
use crate::router::{classify_post, PostTarget, WORKOUT_PREFIX};
use crate::session::SessionStore;
use crate::workout::WorkoutStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub const MSG_CONFIG_UPDATED: &str = "Configuration data updated";
pub const MSG_CONFIG_FAILED: &str = "Error updating configuration";
pub const MSG_WORKOUT_UPDATED: &str = "Workout updated";
pub const MSG_WORKOUT_FAILED: &str = "Error saving workout";

/// HTTP method, as far as the daemon distinguishes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other(String),
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            _ => Method::Other(s.to_string()),
        }
    }

    /// Methods answered with a page.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    New,
    Streaming,
    Finalizing,
    Done,
    Aborted,
}

/// Kind of data a POST body is ingested into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostPurpose {
    /// Not a POST
    None,
    Config,
    Workout,
    /// POST to a path that accepts no form data
    Undef,
}

/// Stores shared by every request, owned by the reactor thread.
pub struct RequestContext<'a> {
    pub sessions: &'a mut SessionStore,
    pub workouts: &'a WorkoutStore,
    pub registry: &'a Arc<ConfigRegistry>,
    pub host: &'a mut dyn HostConfig,
    pub clock: &'a dyn Clock,
}

/// Method and path the response page is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Followup {
    pub method: Method,
    pub path: String,
}

#[derive(Debug)]
pub struct Request {
    state: RequestState,
    method: Method,
    path: String,
    session: Option<SessionId>,
    purpose: PostPurpose,
    decoder: Option<FormDecoder>,
    ingest: Option<Ingest>,
    redirect_url: Option<String>,
    failure: Option<SetupError>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            state: RequestState::New,
            method,
            path: path.into(),
            session: None,
            purpose: PostPurpose::None,
            decoder: None,
            ingest: None,
            redirect_url: None,
            failure: None,
        }
    }

    /// First sight of the exchange: attach the session and, for POSTs,
    /// classify the body and prepare its ingestion.
    ///
    /// Workout POSTs load the workout and index it here, before any body
    /// bytes arrive. A failure leaves the request `Aborted` with the cause
    /// available from [`failure`](Self::failure).
    pub fn begin(
        &mut self,
        cookie: Option<&str>,
        content_type: Option<&str>,
        ctx: &mut RequestContext<'_>,
    ) {
        if self.state != RequestState::New {
            return;
        }

        let now = ctx.clock.now();
        let session = ctx.sessions.find_or_create(cookie, now);
        if let Some(s) = ctx.sessions.get_mut(&session) {
            s.touch(now);
        }
        self.session = Some(session);

        if self.method != Method::Post {
            self.state = RequestState::Streaming;
            return;
        }

        match self.prepare_post(content_type, ctx) {
            Ok(()) => {
                self.decoder = Some(FormDecoder::default());
                self.state = RequestState::Streaming;
                debug!(path = %self.path, purpose = ?self.purpose, "POST ingestion started");
            }
            Err(e) => {
                warn!(path = %self.path, error = %e, "POST setup failed");
                self.failure = Some(e);
                self.state = RequestState::Aborted;
            }
        }
    }

    fn prepare_post(
        &mut self,
        content_type: Option<&str>,
        ctx: &mut RequestContext<'_>,
    ) -> Result<(), SetupError> {
        let target = classify_post(&self.path)?;

        let mime = content_type.and_then(|ct| ct.split(';').next()).map(str::trim);
        if !mime.is_some_and(|m| m.eq_ignore_ascii_case(FORM_URLENCODED)) {
            return Err(SetupError::UnsupportedEncoding {
                content_type: content_type.map(str::to_string),
            });
        }

        match target {
            PostTarget::Config => {
                self.purpose = PostPurpose::Config;
                self.ingest = Some(Ingest::Config(ConfigIngest::new(Arc::clone(ctx.registry))));
            }
            PostTarget::Workout(id) => {
                let timer = ctx.workouts.load(&id)?;
                self.purpose = PostPurpose::Workout;
                self.ingest = Some(Ingest::Workout(WorkoutIngest::new(timer)));
                self.redirect_url = Some(format!("{}/{}", WORKOUT_PREFIX, id));
            }
            PostTarget::Undef => {
                self.purpose = PostPurpose::Undef;
                self.ingest = Some(Ingest::Discard);
            }
        }
        Ok(())
    }

    /// Hand the next piece of the body to the decoder.
    ///
    /// Returns the number of bytes left unconsumed, which is always zero:
    /// bodies of requests that carry no form data are read and dropped.
    pub fn stream(&mut self, chunk: &[u8]) -> usize {
        if self.state != RequestState::Streaming {
            return 0;
        }
        if let (Some(decoder), Some(ingest)) = (self.decoder.as_mut(), self.ingest.as_mut()) {
            decoder.feed(chunk, ingest);
        }
        0
    }

    /// The body is fully consumed: apply what was ingested and decide which
    /// page answers the request.
    ///
    /// Configuration POSTs hand their values to the host and save the default
    /// profile; workout POSTs recompute and rewrite the workout. Either way
    /// the outcome becomes the session's one-shot message and the request
    /// continues as a GET of the redirect target or its own path.
    pub fn finalize(&mut self, ctx: &mut RequestContext<'_>) -> Option<Followup> {
        if self.state != RequestState::Streaming {
            return None;
        }
        self.state = RequestState::Finalizing;

        if let Some(mut decoder) = self.decoder.take() {
            if let Some(ingest) = self.ingest.as_mut() {
                decoder.finish(ingest);
            }
        }

        let message = match self.ingest.take() {
            Some(Ingest::Config(mut config)) => {
                let (registry, pending) = config.parts_mut();
                match config_vars::commit(registry, pending, &mut *ctx.host) {
                    Ok(()) => Some(MSG_CONFIG_UPDATED),
                    Err(e) => {
                        warn!(error = %e, "configuration update failed");
                        Some(MSG_CONFIG_FAILED)
                    }
                }
            }
            Some(Ingest::Workout(workout)) => {
                let mut timer = workout.into_timer();
                match timer.finalize_and_persist() {
                    Ok(()) => Some(MSG_WORKOUT_UPDATED),
                    Err(e) => {
                        warn!(path = %self.path, error = %e, "workout update failed");
                        Some(MSG_WORKOUT_FAILED)
                    }
                }
            }
            Some(Ingest::Discard) | None => None,
        };

        if let Some(msg) = message {
            match self.session.as_ref().and_then(|id| ctx.sessions.get_mut(id)) {
                Some(session) => session.set_message(msg),
                None => warn!(path = %self.path, "session gone before outcome could be reported"),
            }
            info!(path = %self.path, purpose = ?self.purpose, outcome = msg, "POST finalized");
        }

        let method = if self.method == Method::Post {
            Method::Get
        } else {
            self.method.clone()
        };
        let path = self.redirect_url.clone().unwrap_or_else(|| self.path.clone());
        Some(Followup { method, path })
    }

    /// The response has been generated and queued.
    pub fn mark_done(&mut self) {
        if self.state == RequestState::Finalizing {
            self.state = RequestState::Done;
        }
    }

    /// Stop processing after a failure outside setup (e.g. the body could
    /// not be read). Nothing ingested so far is applied.
    pub fn abort(&mut self) {
        self.decoder = None;
        self.ingest = None;
        self.state = RequestState::Aborted;
    }

    /// Completion notification from the network layer.
    ///
    /// Releases the session reference and drops the decoder and any workout
    /// still owned by the request.
    pub fn complete(self, sessions: &mut SessionStore) {
        if let Some(id) = &self.session {
            sessions.release(id);
        }
        debug!(path = %self.path, state = ?self.state, "request completed");
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn purpose(&self) -> PostPurpose {
        self.purpose
    }

    pub fn failure(&self) -> Option<&SetupError> {
        self.failure.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config_vars::ConfigVar;
    use crate::error::ConfigError;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct NullHost {
        writes: Vec<(String, String)>,
    }

    impl HostConfig for NullHost {
        fn read_value(&self, _var: &ConfigVar) -> Result<String, ConfigError> {
            Ok(String::new())
        }
        fn write_value(&mut self, var: &ConfigVar, value: &str) -> Result<(), ConfigError> {
            self.writes.push((var.lookup_name.clone(), value.to_string()));
            Ok(())
        }
        fn save_profile(&mut self, _profile: &str) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    struct Fixture {
        sessions: SessionStore,
        workouts: WorkoutStore,
        registry: Arc<ConfigRegistry>,
        host: NullHost,
        clock: ManualClock,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                sessions: SessionStore::with_rng(StdRng::seed_from_u64(1)),
                workouts: WorkoutStore::new(dir.path()),
                registry: Arc::new(ConfigRegistry::new(vec![ConfigVar::new(
                    "api_key", "apiKey", true,
                )])),
                host: NullHost::default(),
                clock: ManualClock::new(Utc::now()),
                _dir: dir,
            }
        }

        fn ctx(&mut self) -> RequestContext<'_> {
            RequestContext {
                sessions: &mut self.sessions,
                workouts: &self.workouts,
                registry: &self.registry,
                host: &mut self.host,
                clock: &self.clock,
            }
        }
    }

    #[test]
    fn test_config_post_walks_all_states() {
        let mut fx = Fixture::new();
        let mut req = Request::new(Method::Post, "/config");
        assert_eq!(req.state(), RequestState::New);

        req.begin(None, Some(FORM_URLENCODED), &mut fx.ctx());
        assert_eq!(req.state(), RequestState::Streaming);
        assert_eq!(req.purpose(), PostPurpose::Config);

        assert_eq!(req.stream(b"apiKey=sec"), 0);
        assert_eq!(req.stream(b"ret123"), 0);
        let follow = req.finalize(&mut fx.ctx()).unwrap();
        assert_eq!(req.state(), RequestState::Finalizing);
        assert_eq!(follow.method, Method::Get);
        assert_eq!(follow.path, "/config");
        assert_eq!(
            fx.host.writes,
            vec![("apiKey".to_string(), "secret123".to_string())]
        );

        req.mark_done();
        assert_eq!(req.state(), RequestState::Done);
        let sid = req.session().cloned().unwrap();
        assert_eq!(
            fx.sessions.get(&sid).and_then(|s| s.message()),
            Some(MSG_CONFIG_UPDATED)
        );
        req.complete(&mut fx.sessions);
        assert_eq!(fx.sessions.get(&sid).map(|s| s.refcount()), Some(0));
    }

    #[test]
    fn test_missing_workout_aborts_but_releases_session() {
        let mut fx = Fixture::new();
        let mut req = Request::new(Method::Post, "/workout/2013-01-01-00-00-00");
        req.begin(None, Some(FORM_URLENCODED), &mut fx.ctx());
        assert_eq!(req.state(), RequestState::Aborted);
        assert!(matches!(
            req.failure(),
            Some(SetupError::WorkoutNotFound { .. })
        ));
        assert!(req.finalize(&mut fx.ctx()).is_none());
        let sid = req.session().cloned().unwrap();
        req.complete(&mut fx.sessions);
        assert_eq!(fx.sessions.get(&sid).map(|s| s.refcount()), Some(0));
    }

    #[test]
    fn test_non_form_encoding_aborts() {
        let mut fx = Fixture::new();
        let mut req = Request::new(Method::Post, "/config");
        req.begin(None, Some("multipart/form-data; boundary=x"), &mut fx.ctx());
        assert_eq!(req.state(), RequestState::Aborted);
    }

    #[test]
    fn test_undef_post_discards_body() {
        let mut fx = Fixture::new();
        let mut req = Request::new(Method::Post, "/review");
        req.begin(None, Some(FORM_URLENCODED), &mut fx.ctx());
        assert_eq!(req.purpose(), PostPurpose::Undef);
        req.stream(b"apiKey=zzz");
        let follow = req.finalize(&mut fx.ctx()).unwrap();
        assert_eq!(follow.path, "/review");
        assert!(fx.host.writes.is_empty());
        let sid = req.session().cloned().unwrap();
        assert_eq!(fx.sessions.get(&sid).and_then(|s| s.message()), None);
    }

    #[test]
    fn test_get_keeps_method() {
        let mut fx = Fixture::new();
        let mut req = Request::new(Method::Head, "/review");
        req.begin(None, None, &mut fx.ctx());
        assert_eq!(req.purpose(), PostPurpose::None);
        let follow = req.finalize(&mut fx.ctx()).unwrap();
        assert_eq!(follow.method, Method::Head);
    }
}
