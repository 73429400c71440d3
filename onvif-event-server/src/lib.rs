//! # onvif-event-server
//!
//! HTTP front-end for the ONVIF emulator event service. Each request is
//! forwarded to a [`NotificationsManager`](onvif_events::NotificationsManager)
//! and its answer rendered as a SOAP 1.2 envelope.
//!
//! Long polls are awaited asynchronously, so an outstanding `PullMessages`
//! holds no server thread while it waits on its pull point.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use routes::{parse_route, routes, Route, ServiceQuery};
pub use server::serve;
