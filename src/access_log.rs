//! 访问日志：每个请求一行，记录客户端地址、状态码、方法、路径与响应大小。
//!
//! 着色后的日志行需要原样写入终端，因此不经过 tracing 的格式化层，
//! 而是由 [`AccessLog`] 直接写入 stderr。

use axum::extract::{Extension, connect_info::ConnectInfo};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::{body::Body as AxumBody, middleware};
use chrono::Local;
use std::io::Write;
use std::net::SocketAddr;

use crate::bytes::human_readable_bytes;
use crate::colour::Palette;

#[cfg(test)]
use std::sync::{Arc, Mutex};

/// 访问日志输出端，克隆后共享同一输出。
#[derive(Clone, Debug)]
pub struct AccessLog {
    palette: Palette,
    sink: Sink,
}

#[derive(Clone, Debug)]
enum Sink {
    Stderr,
    #[cfg(test)]
    Memory(Arc<Mutex<Vec<String>>>),
}

impl AccessLog {
    pub fn stderr(palette: Palette) -> Self {
        Self {
            palette,
            sink: Sink::Stderr,
        }
    }

    #[cfg(test)]
    pub fn memory(palette: Palette) -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let log = Self {
            palette,
            sink: Sink::Memory(lines.clone()),
        };
        (log, lines)
    }

    /// 记录一行 HTTP 访问日志：`<ip> | <status> | <method> <path> | <size>`。
    pub fn record(&self, entry: &LoggedRequest) {
        self.write(&entry.render(self.palette));
    }

    /// 记录上传成功的日志行，附带文件名。
    pub fn record_upload(&self, entry: &LoggedRequest, filename: &str) {
        let notice = self.palette.highlight(&format!("UPLOADED {filename}!"));
        self.write(&format!("{} | {notice}", entry.render(self.palette)));
    }

    /// 记录一行 WebDAV 访问日志：`<ip> | <method> | <path>`。
    pub fn record_webdav(&self, entry: &LoggedRequest) {
        self.write(&format!(
            "{} | {} | {}",
            self.palette.highlight(&entry.remote_address),
            self.palette.webdav_method(&entry.method),
            entry.path
        ));
    }

    fn write(&self, line: &str) {
        match &self.sink {
            Sink::Stderr => {
                let timestamp = Local::now().format("%Y/%m/%d %H:%M:%S");
                let mut stderr = std::io::stderr().lock();
                let _ = writeln!(stderr, "{timestamp} {line}");
            }
            #[cfg(test)]
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
        }
    }
}

/// 单个请求的日志记录，请求开始时创建，响应生成后补全状态码与大小。
#[derive(Clone, Debug)]
pub struct LoggedRequest {
    pub remote_address: String,
    pub method: String,
    pub path: String,
    pub status: StatusCode,
    pub response_size: Option<String>,
}

impl LoggedRequest {
    pub fn start<B>(req: &Request<B>) -> Self {
        let remote_address = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let path = req
            .uri()
            .path_and_query()
            .map(|value| value.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        Self {
            remote_address,
            method: req.method().as_str().to_string(),
            path,
            status: StatusCode::OK,
            response_size: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.response_size = Some(bytes.to_string());
        self
    }

    /// 从响应中读取状态码与 `Content-Length`。
    pub fn finish<B>(&mut self, response: &Response<B>) {
        self.status = response.status();
        self.response_size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
    }

    fn render(&self, palette: Palette) -> String {
        format!(
            "{} | {} | {} {} | {}",
            palette.highlight(&self.remote_address),
            palette.status(self.status.as_u16()),
            palette.http_method(&self.method),
            self.path,
            human_readable_bytes(self.response_size.as_deref())
        )
    }
}

/// 访问日志中间件：包裹静态文件服务，请求完成后输出一行日志。
pub async fn log_requests(
    Extension(log): Extension<AccessLog>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    let mut entry = LoggedRequest::start(&req);
    let response = next.run(req).await;
    entry.finish(&response);
    log.record(&entry);
    response
}

/// WebDAV 访问日志中间件。
pub async fn log_webdav_requests(
    Extension(log): Extension<AccessLog>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Response {
    let entry = LoggedRequest::start(&req);
    let response = next.run(req).await;
    log.record_webdav(&entry);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn request(method: &str, uri: &str) -> Request<AxumBody> {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .body(AxumBody::empty())
            .expect("request");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 51234))));
        req
    }

    #[test]
    fn render_strips_port_and_formats_size() {
        let mut entry = LoggedRequest::start(&request("GET", "/docs/a.txt?x=1"));
        let response = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(header::CONTENT_LENGTH, "1536")
            .body(())
            .expect("response");
        entry.finish(&response);

        assert_eq!(
            entry.render(Palette::new(false)),
            "192.168.1.20 | 404 | GET /docs/a.txt?x=1 | 1.5kB"
        );
    }

    #[test]
    fn missing_content_length_renders_dash() {
        let mut entry = LoggedRequest::start(&request("HEAD", "/"));
        entry.finish(&Response::new(()));
        assert_eq!(
            entry.render(Palette::new(false)),
            "192.168.1.20 | 200 | HEAD / | -"
        );
    }

    #[test]
    fn upload_and_webdav_lines() {
        let (log, lines) = AccessLog::memory(Palette::new(false));
        let entry = LoggedRequest::start(&request("POST", "/upload")).with_size(5);
        log.record_upload(&entry, "report.txt");
        log.record_webdav(&LoggedRequest::start(&request("PROPFIND", "/webdav/")));

        let lines = lines.lock().unwrap();
        assert_eq!(
            lines.as_slice(),
            [
                "192.168.1.20 | 200 | POST /upload | 5B | UPLOADED report.txt!",
                "192.168.1.20 | PROPFIND | /webdav/",
            ]
        );
    }

    #[tokio::test]
    async fn middleware_logs_once_with_handler_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (log, lines) = AccessLog::memory(Palette::new(false));
        let app = Router::new()
            .route(
                "/teapot",
                get(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async {
                        (
                            StatusCode::IM_A_TEAPOT,
                            [(header::CONTENT_LENGTH, "15")],
                            "short and stout",
                        )
                            .into_response()
                    }
                }),
            )
            .layer(middleware::from_fn(log_requests))
            .layer(Extension(log));

        let response = app.oneshot(request("GET", "/teapot")).await.unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "192.168.1.20 | 418 | GET /teapot | 15B");
    }

    #[tokio::test]
    async fn middleware_defaults_to_ok() {
        let (log, lines) = AccessLog::memory(Palette::new(false));
        let app = Router::new()
            .route("/", get(|| async {}))
            .layer(middleware::from_fn(log_requests))
            .layer(Extension(log));

        let response = app.oneshot(request("GET", "/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(lines.lock().unwrap().as_slice(), ["192.168.1.20 | 200 | GET / | -"]);
    }
}
