//! 路由组装与监听：HTTP 文件服务（可选认证与上传）或 WebDAV。

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::Request;
use axum::routing::any;
use axum::{Router, middleware};
use axum_server::Handle;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span, warn};

use crate::access_log::{AccessLog, log_requests, log_webdav_requests};
use crate::auth::require_basic_auth;
use crate::config::{SHUTDOWN_GRACE_SECS, ServerConfig};
use crate::error::StartupError;
use crate::listing::file_router;
use crate::tls;
use crate::upload::{UploadTarget, upload_file};
use crate::webdav::{DavMount, webdav_handler};

/// 组装 HTTP 路由。
///
/// 认证在最外层；访问日志只包裹静态文件服务，上传接口自行记录日志。
pub fn http_router(config: &ServerConfig, log: AccessLog) -> Router {
    let mut app = file_router(&config.directory).layer(middleware::from_fn(log_requests));

    if let Some(route) = &config.upload_route {
        let target = Arc::new(UploadTarget::new(&config.directory));
        info!(route = %format!("/{route}"), dir = target.dir(), "uploads enabled");
        let upload = Router::new()
            .route(
                &format!("/{route}"),
                any(upload_file).layer(DefaultBodyLimit::disable()),
            )
            .layer(Extension(target));
        app = app.merge(upload);
    }

    if let Some(credentials) = &config.credentials {
        info!(user = credentials.username(), "basic auth enabled");
        app = app
            .layer(middleware::from_fn(require_basic_auth))
            .layer(Extension(Arc::new(credentials.clone())));
    }

    app.layer(Extension(log))
}

/// 组装 WebDAV 路由：前缀下的请求交给 dav-server，其余返回 404，均记录日志。
pub fn webdav_router(directory: &Path, prefix: &str, log: AccessLog) -> Router {
    let mount = Arc::new(DavMount::new(directory, prefix));
    Router::new()
        .fallback(webdav_handler)
        .layer(middleware::from_fn(log_webdav_requests))
        .layer(Extension(mount))
        .layer(Extension(log))
}

fn with_tracing(app: Router) -> Router {
    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let client_ip = request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
                    .unwrap_or_else(|| "unknown".to_string());

                info_span!(
                    env!("CARGO_CRATE_NAME"),
                    client_ip,
                    method = ?request.method(),
                    path = ?request.uri().path(),
                )
            })
            .on_request(DefaultOnRequest::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    )
}

/// 解析监听地址，支持 IP 字面量与主机名。
pub async fn resolve_bind_addr(address: &str, port: u16) -> Result<SocketAddr, StartupError> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((address, port))
        .await
        .map_err(|err| StartupError::InvalidAddress(format!("{address}: {err}")))?
        .next()
        .ok_or_else(|| StartupError::InvalidAddress(address.to_string()))
}

/// 校验配置并启动监听，直到收到终止信号。
///
/// TLS 材料在绑定端口之前校验并加载。
pub async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let tls_config = match &config.tls {
        Some(paths) => Some(tls::build_rustls_config(paths).await?),
        None => None,
    };
    let addr = resolve_bind_addr(&config.address, config.port).await?;

    let log = AccessLog::stderr(config.palette);
    let app = match &config.webdav_prefix {
        Some(prefix) => webdav_router(Path::new(&config.directory), prefix, log),
        None => http_router(&config, log),
    };
    let service = with_tracing(app).into_make_service_with_connect_info::<SocketAddr>();

    match &config.webdav_prefix {
        Some(prefix) => info!(
            "Serving {} via {} on {}{}/",
            config.directory,
            config.protocol_label(),
            addr,
            prefix
        ),
        None => info!(
            "Serving {} via {} on {}",
            config.directory,
            config.protocol_label(),
            addr
        ),
    }

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    let result = match tls_config {
        Some(tls_config) => {
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(service)
                .await
        }
        None => axum_server::bind(addr).handle(handle).serve(service).await,
    };
    result.map_err(StartupError::Bind)
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_SECS)));
}
