//! HTTP server setup and route registration.
//!
//! # Responsibilities
//! - Collect handlers per method and route pattern
//! - Put every handler behind the [`Supervisor`]
//! - Wire up middleware (tracing, request ID)
//! - Serve until the shutdown signal fires

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Request},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::http::supervisor::{Handle, Supervisor};
use crate::pool::Pools;

struct Route {
    filter: MethodFilter,
    path: String,
    handler: Arc<dyn Handle>,
}

/// Handlers to serve, keyed by method and route pattern.
///
/// Patterns use axum syntax, e.g. `/resorts/{id}`.
#[derive(Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<H: Handle>(mut self, filter: MethodFilter, path: impl Into<String>, handler: H) -> Self {
        self.routes.push(Route {
            filter,
            path: path.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn get<H: Handle>(self, path: impl Into<String>, handler: H) -> Self {
        self.route(MethodFilter::GET, path, handler)
    }

    pub fn post<H: Handle>(self, path: impl Into<String>, handler: H) -> Self {
        self.route(MethodFilter::POST, path, handler)
    }

    pub fn put<H: Handle>(self, path: impl Into<String>, handler: H) -> Self {
        self.route(MethodFilter::PUT, path, handler)
    }

    pub fn delete<H: Handle>(self, path: impl Into<String>, handler: H) -> Self {
        self.route(MethodFilter::DELETE, path, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// HTTP server running supervised handlers.
pub struct HttpServer {
    router: Router,
    supervisor: Arc<Supervisor>,
}

impl HttpServer {
    pub fn new(config: AppConfig, routes: Routes, pools: Arc<Pools>) -> Self {
        let supervisor = Arc::new(Supervisor::new(config.timeouts.request_budget(), pools));
        let router = Self::build_router(routes, &supervisor);
        Self { router, supervisor }
    }

    fn build_router(routes: Routes, supervisor: &Arc<Supervisor>) -> Router {
        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for Route { filter, path, handler } in routes.routes {
            let pattern: Arc<str> = Arc::from(path.as_str());
            let supervisor = Arc::clone(supervisor);
            let endpoint = move |Path(params): Path<HashMap<String, String>>, request: Request| {
                let supervisor = Arc::clone(&supervisor);
                let pattern = Arc::clone(&pattern);
                let handler = Arc::clone(&handler);
                async move { supervisor.run(pattern, handler, params, request).await }
            };
            let methods = by_path.remove(&path).unwrap_or_default();
            by_path.insert(path, methods.on(filter, endpoint));
        }

        let mut router = Router::new();
        for (path, methods) in by_path {
            router = router.route(&path, methods);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
        )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight
    /// requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            budget = ?self.supervisor.budget(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::http::request::RequestContextExt;
    use crate::http::response::{JsonResponse, ResponseWriter};
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn server(routes: Routes) -> HttpServer {
        HttpServer::new(AppConfig::default(), routes, Pools::new(&PoolConfig::default()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_routes_builder() {
        let noop = |_req: Request, _w: ResponseWriter| async move { None };
        let routes = Routes::new()
            .get("/a", noop)
            .post("/a", noop)
            .delete("/b", noop);
        assert_eq!(routes.len(), 3);
        assert!(Routes::new().is_empty());
    }

    #[tokio::test]
    async fn test_route_params_and_request_id() {
        let routes = Routes::new().get("/resorts/{id}", |req: Request, _w: ResponseWriter| async move {
            let ctx = req.context().cloned();
            Some(JsonResponse::new().set_data(serde_json::json!({
                "route": ctx.as_ref().map(|c| c.route().to_string()),
                "id": ctx.as_ref().and_then(|c| c.param("id").map(str::to_owned)),
                "request_id": ctx.as_ref().and_then(|c| c.request_id().map(str::to_owned)),
            })))
        });
        let server = server(routes);

        let response = server
            .router()
            .oneshot(Request::builder().uri("/resorts/7").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response.headers().get(X_REQUEST_ID).cloned().unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["route"], "/resorts/{id}");
        assert_eq!(body["data"]["id"], "7");
        assert_eq!(body["data"]["request_id"], echoed.to_str().unwrap());
        assert_eq!(server.supervisor().stats().completed(), 1);
    }

    #[tokio::test]
    async fn test_method_filter() {
        let routes = Routes::new().post("/login", |_req: Request, _w: ResponseWriter| async move {
            Some(JsonResponse::new().set_message("ok"))
        });
        let router = server(routes).router();

        let response = router
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
