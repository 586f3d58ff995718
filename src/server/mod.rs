//! # Server Module
//!
//! HTTP side of the daemon: the per-request state machine, the page
//! responses it produces, the service that drives requests through both,
//! and the single-threaded reactor that feeds it from the network.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{DaemonHandle, HttpDaemon};
pub use request::{Method, PostPurpose, Request, RequestContext, RequestState};
pub use response::{cookie_value, PageResponse, COOKIE_NAME};
pub use service::{AppService, IncomingRequest};
