//! 目录浏览：目录下没有 `index.html` 时返回 HTML 文件列表。

use axum::Router;
use axum::extract::State;
use axum::handler::Handler;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tower_http::services::ServeDir;
use tracing::warn;

// 链接中需要转义的字符
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// 静态文件服务：文件与 `index.html` 由 `ServeDir` 处理，找不到时交给目录列表。
pub fn file_router(directory: &str) -> Router {
    let root = Arc::new(PathBuf::from(directory));
    Router::new()
        .fallback_service(ServeDir::new(directory).fallback(list_directory.with_state(root)))
}

async fn list_directory(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Some(dir) = resolve_dir(&root, uri.path()).await else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut names = Vec::new();
    match fs::read_dir(&dir).await {
        Ok(mut entries) => {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                    name.push('/');
                }
                names.push(name);
            }
        }
        Err(err) => {
            warn!(error = %err, dir = ?dir, "failed to read directory");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    names.sort();

    let body = render_listing(&names);
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body,
    )
        .into_response()
}

/// 将请求路径解析为共享目录内的目录，越界或不是目录时返回 `None`。
async fn resolve_dir(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let relative = uri_path.strip_prefix('/')?;
    let mut path = root.to_path_buf();
    for component in relative.split('/').filter(|c| !c.is_empty()) {
        let decoded = percent_decode_str(component).decode_utf8().ok()?;
        if decoded == ".." || decoded.contains(['/', '\\']) {
            return None;
        }
        path.push(decoded.as_ref());
    }

    let root = fs::canonicalize(root).await.ok()?;
    let path = fs::canonicalize(&path).await.ok()?;
    let is_dir = fs::metadata(&path).await.is_ok_and(|meta| meta.is_dir());
    (is_dir && path.starts_with(&root)).then_some(path)
}

fn render_listing(names: &[String]) -> String {
    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for name in names {
        let href = utf8_percent_encode(name, HREF_ESCAPE).to_string();
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            escape_html(&href),
            escape_html(name)
        ));
    }
    html.push_str("</pre>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
