//! WebDAV 请求处理封装。

use axum::extract::Extension;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use dav_server::{DavHandler, localfs::LocalFs, memls::MemLs};
use std::path::Path;
use std::sync::Arc;

/// 挂载在某个前缀下的 dav-server 处理器。
pub struct DavMount {
    prefix: String,
    handler: DavHandler,
}

impl DavMount {
    /// 本地文件系统 + 内存锁，请求路径的前缀由 dav-server 剥离。
    pub fn new(directory: &Path, prefix: &str) -> Self {
        let handler = DavHandler::builder()
            .strip_prefix(prefix)
            .filesystem(LocalFs::new(directory, false, false, false))
            .locksystem(MemLs::new())
            .build_handler();
        Self {
            prefix: prefix.to_string(),
            handler,
        }
    }

    /// 路径等于前缀，或以 `<prefix>/` 开头。
    pub fn covers(&self, path: &str) -> bool {
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// 规范化挂载前缀：`webdav`、`/webdav/` 均变为 `/webdav`，空前缀挂载在根路径。
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// 代理 WebDAV 请求到 dav-server 处理器，前缀以外的路径返回 404。
pub async fn webdav_handler(
    Extension(mount): Extension<Arc<DavMount>>,
    req: Request<axum::body::Body>,
) -> Response {
    if !mount.covers(req.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    mount.handler.handle(req).await.into_response()
}

#[cfg(test)]
mod tests {
    use super::{DavMount, normalize_prefix};

    #[test]
    fn prefix_normalization() {
        assert_eq!(normalize_prefix("webdav"), "/webdav");
        assert_eq!(normalize_prefix("/webdav/"), "/webdav");
        assert_eq!(normalize_prefix("dav/share"), "/dav/share");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn mount_covers_only_its_prefix() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mount = DavMount::new(temp.path(), "/webdav");
        assert!(mount.covers("/webdav"));
        assert!(mount.covers("/webdav/"));
        assert!(mount.covers("/webdav/a/b.txt"));
        assert!(!mount.covers("/"));
        assert!(!mount.covers("/elsewhere"));
        assert!(!mount.covers("/webdavX/elsewhere"));

        let root = DavMount::new(temp.path(), "");
        assert!(root.covers("/"));
        assert!(root.covers("/anything"));
    }
}
