//! # workout_httpd
//!
//! An embedded, single-threaded HTTP daemon that lets a user edit an
//! application's configuration and review or correct recorded workouts
//! through plain HTML forms. Nothing on the pages depends on JavaScript.
//!
//! The daemon is owned by a host application: the host supplies the
//! configuration accessors ([`HostConfig`]), starts the reactor with
//! [`HttpDaemon::start`] and stops it with [`DaemonHandle::stop`].
//!
//! ## Architecture
//!
//! - **[`session`]** - in-memory session registry keyed by the `session` cookie
//! - **[`workout`]** - workout timer model (legs of splits), split index,
//!   recompute-and-persist, the on-disk workout store
//! - **[`form`]** - streaming `application/x-www-form-urlencoded` decoding
//!   and the ingestion of fields into configuration buffers or splits
//! - **[`server`]** - per-request state machine, page service and the
//!   reactor loop built on `tiny_http`
//! - **[`router`]** / **[`pages`]** - path to page mapping and the HTML itself
//! - **[`config_vars`]** / **[`host`]** - editable configuration variables and a
//!   file-backed host
//!
//! ### Workout Edit Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Reactor as HttpDaemon
//!     participant Service as AppService
//!     participant Req as Request
//!     participant Ingest as WorkoutIngest
//!     participant Timer as WorkoutTimer
//!
//!     Client->>Reactor: POST /workout/<id>
//!     Reactor->>Service: handle(incoming)
//!     Service->>Req: begin (attach session, load timer, build index)
//!     loop every body chunk
//!         Service->>Req: stream(chunk)
//!         Req->>Ingest: field(key, chunk)
//!         Ingest->>Timer: set delta_t / delta_d
//!     end
//!     Service->>Req: finalize
//!     Req->>Timer: finalize_and_persist
//!     Req-->>Service: GET /workout/<id>
//!     Service-->>Reactor: page + Set-Cookie
//!     Service->>Req: complete (release session)
//!     Reactor-->>Client: 200 OK
//! ```
//!
//! ## Runtime Considerations
//!
//! Every session, request and workout mutation happens on the reactor
//! thread, so none of the stores are synchronized. [`server::AppService`]
//! must not be shared between threads. Sockets are read on per-connection
//! threads that only forward body chunks to the reactor, so a slow client
//! never holds up the loop.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use workout_httpd::{
//!     AppService, ConfigRegistry, HttpDaemon, JsonProfileHost, ServerSettings, WorkoutStore,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = ServerSettings::from_env();
//! let mut host = JsonProfileHost::load("./config")?;
//! let service = AppService::new(
//!     WorkoutStore::new(&settings.data_dir),
//!     Arc::new(ConfigRegistry::default()),
//! );
//! let mut daemon = HttpDaemon::new(&settings, service);
//! daemon.start(&mut host)?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod clock;
pub mod config_vars;
pub mod error;
pub mod form;
pub mod host;
pub mod ids;
pub mod logging;
pub mod pages;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;
pub mod workout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config_vars::{ConfigRegistry, ConfigVar, HostConfig};
pub use error::{ConfigError, DaemonError, PersistError, SetupError};
pub use host::JsonProfileHost;
pub use ids::{SessionId, WorkoutId};
pub use runtime_config::ServerSettings;
pub use server::{AppService, DaemonHandle, HttpDaemon, IncomingRequest, PageResponse};
pub use session::{Session, SessionStore};
pub use workout::{WorkoutStore, WorkoutTimer};
