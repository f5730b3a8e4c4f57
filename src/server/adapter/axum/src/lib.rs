/* src/server/adapter/axum/src/lib.rs */

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use vessel_server::{ServerManifest, VesselServer, dispatch};

/// Re-export vessel-server core for convenience
pub use vessel_server;

/// Extension trait that mounts a Vessel manifest on an Axum router.
pub trait IntoAxumRouter {
  fn into_axum_router(self) -> Router;
  fn serve(
    self,
    addr: &str,
  ) -> impl std::future::Future<Output = Result<(), Box<dyn std::error::Error>>> + Send;
}

impl IntoAxumRouter for Arc<ServerManifest> {
  fn into_axum_router(self) -> Router {
    // Vessel does its own routing; axum only hands every request over.
    Router::new().fallback(handle).with_state(self)
  }

  async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let http_routes = self.routes.http.len();
    let app_routes = self.routes.app.len();
    let router = self.into_axum_router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, http_routes, app_routes, "vessel server listening");
    axum::serve(listener, router).await?;
    Ok(())
  }
}

impl IntoAxumRouter for VesselServer {
  fn into_axum_router(self) -> Router {
    self.into_manifest().into_axum_router()
  }

  async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    self.into_manifest().serve(addr).await
  }
}

async fn handle(State(manifest): State<Arc<ServerManifest>>, req: Request) -> Response {
  let (parts, body) = req.into_parts();
  let bytes = match body.collect().await {
    Ok(collected) => collected.to_bytes(),
    Err(e) => {
      tracing::warn!(uri = %parts.uri, error = %e, "failed to read request body");
      return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
    }
  };
  let res = dispatch(&manifest, vessel_server::Request::from_parts(parts, bytes)).await;
  res.map(Body::from)
}
