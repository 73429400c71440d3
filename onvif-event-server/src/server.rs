//! HTTP server lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use onvif_events::NotificationsManager;
use tracing::info;

use crate::error::Result;
use crate::routes::routes;

/// Serve the event service on `addr` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish; an outstanding long poll is
/// answered once the manager shuts down or its pull point times out.
pub async fn serve<F>(manager: Arc<NotificationsManager>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let path = manager.options().subscription_path.clone();
    let (bound, server) =
        warp::serve(routes(manager)).try_bind_with_graceful_shutdown(addr, shutdown)?;

    info!("Event service listening on http://{bound}/{path}");
    server.await;
    info!("Event service stopped");
    Ok(())
}
