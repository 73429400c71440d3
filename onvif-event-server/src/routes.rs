//! Warp filters for the event service endpoints.
//!
//! All endpoints live under the manager's subscription path:
//!
//! | request | operation |
//! |---|---|
//! | `POST /<path>` | CreatePullPointSubscription |
//! | `POST /<path>/<id>/pull` | PullMessages |
//! | `POST /<path>/<id>/renew` | Renew |
//! | `POST /<path>/<id>/sync` | SetSynchronizationPoint |
//! | `DELETE /<path>/<id>` | Unsubscribe |

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use onvif_events::encoding;
use onvif_events::pull_point::DEFAULT_MAX_MESSAGES;
use onvif_events::{EventError, NotificationsManager, PendingResponse};
use serde::Deserialize;
use tracing::{debug, error, warn};
use warp::http::{header::CONTENT_TYPE, Method, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};
use xmltree::Element;

/// Content type of every SOAP reply.
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Poll timeout used when the request does not name one.
const DEFAULT_PULL_TIMEOUT_SECS: u64 = 60;

/// Event service operation addressed by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CreatePullPoint,
    PullMessages(String),
    Renew(String),
    SetSynchronizationPoint(String),
    Unsubscribe(String),
}

/// Query parameters accepted by the event service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceQuery {
    /// Requested poll timeout in seconds
    pub timeout: Option<u64>,
    /// Requested message limit
    pub limit: Option<usize>,
    /// WS-Addressing message id echoed as `RelatesTo`
    pub msg_id: Option<String>,
}

impl ServiceQuery {
    fn msg_id(&self) -> &str {
        self.msg_id.as_deref().unwrap_or_default()
    }
}

/// Map a request onto an event service operation.
///
/// Returns `None` for paths outside `subscription_path` and for methods an
/// endpoint does not accept. Subscription references are returned as
/// `<subscription_path>/<id>`.
pub fn parse_route(method: &Method, path: &str, subscription_path: &str) -> Option<Route> {
    let base = subscription_path.trim_matches('/');
    let rest = path.trim_matches('/').strip_prefix(base)?;

    if rest.is_empty() {
        return (method == Method::POST).then_some(Route::CreatePullPoint);
    }

    let mut segments = rest.strip_prefix('/')?.split('/');
    let id = segments.next().filter(|id| !id.is_empty())?;
    let action = segments.next();
    if segments.next().is_some() {
        return None;
    }

    let reference = format!("{base}/{id}");
    match action {
        None if method == Method::DELETE => Some(Route::Unsubscribe(reference)),
        Some(action) if method == Method::POST => match action {
            "pull" => Some(Route::PullMessages(reference)),
            "renew" => Some(Route::Renew(reference)),
            "sync" => Some(Route::SetSynchronizationPoint(reference)),
            _ => None,
        },
        _ => None,
    }
}

/// Build the event service filter.
pub fn routes(
    manager: Arc<NotificationsManager>,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::query::<ServiceQuery>())
        .and(warp::header::optional::<String>("host"))
        .and(warp::any().map(move || manager.clone()))
        .and_then(
            |method: Method,
             path: warp::path::FullPath,
             query: ServiceQuery,
             host: Option<String>,
             manager: Arc<NotificationsManager>| async move {
                let route = parse_route(&method, path.as_str(), &manager.options().subscription_path)
                    .ok_or_else(warp::reject::not_found)?;
                debug!(?route, ?query, "Event service request");

                let reply = match dispatch(&manager, route, &query, host.as_deref()).await {
                    Ok((body, relates_to)) => soap_reply(body, relates_to.as_deref(), StatusCode::OK),
                    Err(error) => fault_reply(&error),
                };
                Ok::<_, Rejection>(reply)
            },
        )
        .recover(handle_rejection)
        .unify()
}

/// Run one operation and return the reply body with its `RelatesTo` id.
async fn dispatch(
    manager: &NotificationsManager,
    route: Route,
    query: &ServiceQuery,
    host: Option<&str>,
) -> onvif_events::Result<(Element, Option<String>)> {
    let relates_to = query.msg_id.clone();

    match route {
        Route::CreatePullPoint => {
            let handle = manager.create_pull_point()?.recv().await?;
            let base_address = format!("http://{}", host.unwrap_or("localhost"));
            Ok((
                encoding::create_pull_point_response(&handle, &base_address),
                relates_to,
            ))
        }
        Route::PullMessages(reference) => {
            let timeout = Duration::from_secs(query.timeout.unwrap_or(DEFAULT_PULL_TIMEOUT_SECS));
            let limit = query.limit.unwrap_or(DEFAULT_MAX_MESSAGES);

            let (sink, pending) = PendingResponse::channel();
            manager.pull_messages(sink, reference, query.msg_id(), timeout, limit)?;
            let response = pending.recv().await??;
            let relates_to = Some(response.relates_to.clone());
            Ok((encoding::pull_messages_response(&response), relates_to))
        }
        Route::Renew(reference) => {
            let (sink, pending) = PendingResponse::channel();
            manager.renew(sink, reference, query.msg_id())?;
            let response = pending.recv().await??;
            let relates_to = Some(response.relates_to.clone());
            Ok((encoding::renew_response(&response), relates_to))
        }
        Route::SetSynchronizationPoint(reference) => {
            let (sink, pending) = PendingResponse::channel();
            manager.set_synchronization_point(sink, reference)?;
            pending.recv().await??;
            Ok((encoding::set_synchronization_point_response(), relates_to))
        }
        Route::Unsubscribe(reference) => {
            let (sink, pending) = PendingResponse::channel();
            manager.unsubscribe(sink, reference)?;
            pending.recv().await??;
            Ok((encoding::unsubscribe_response(), relates_to))
        }
    }
}

fn soap_reply(body: Element, relates_to: Option<&str>, status: StatusCode) -> Response {
    let envelope = encoding::soap_envelope(body, relates_to);
    match encoding::to_xml_string(&envelope) {
        Ok(xml) => warp::reply::with_status(
            warp::reply::with_header(xml, CONTENT_TYPE, SOAP_CONTENT_TYPE),
            status,
        )
        .into_response(),
        Err(e) => {
            error!("Failed to render SOAP envelope: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Sender faults are answered with 400, receiver faults with 500.
fn fault_reply(error: &EventError) -> Response {
    let status = if error.is_client_fault() {
        warn!("Client fault: {}", error);
        StatusCode::BAD_REQUEST
    } else {
        error!("Event service failure: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    soap_reply(encoding::fault_element(error), None, status)
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Unknown event service endpoint")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query parameters")
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(warp::reply::with_status(message, code).into_response())
}
