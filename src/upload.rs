//! 单文件上传：接收 multipart 表单中名为 `file` 的字段并写入目标目录。

use axum::body::Body as AxumBody;
use axum::extract::multipart::Field;
use axum::extract::{Extension, FromRequest, Multipart};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::{MAIN_SEPARATOR, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::access_log::{AccessLog, LoggedRequest};
use crate::error::ApiError;

pub const UPLOAD_FIELD: &str = "file";

/// 上传目标目录，路径始终以分隔符结尾。
#[derive(Clone, Debug)]
pub struct UploadTarget {
    dir: String,
}

impl UploadTarget {
    pub fn new(dir: &str) -> Self {
        Self {
            dir: with_trailing_separator(dir),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// 拼接目标文件路径，拒绝包含路径分隔符或 `..` 的文件名。
    pub fn destination(&self, filename: &str) -> Result<PathBuf, ApiError> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\'])
        {
            return Err(ApiError::BadRequest(format!("invalid filename {filename:?}")));
        }
        Ok(PathBuf::from(format!("{}{filename}", self.dir)))
    }
}

fn with_trailing_separator(dir: &str) -> String {
    if dir.ends_with('/') || dir.ends_with(MAIN_SEPARATOR) {
        dir.to_string()
    } else {
        format!("{dir}{MAIN_SEPARATOR}")
    }
}

/// 上传接口：仅接受 POST，其他方法返回 403。
pub async fn upload_file(
    Extension(target): Extension<Arc<UploadTarget>>,
    Extension(log): Extension<AccessLog>,
    req: Request<AxumBody>,
) -> Response {
    let entry = LoggedRequest::start(&req);
    if req.method() != Method::POST {
        log.record(&entry.with_status(StatusCode::FORBIDDEN));
        return ApiError::Forbidden.into_response();
    }

    match store_upload(&target, req).await {
        Ok(stored) => {
            log.record_upload(&entry.with_size(stored.size), &stored.filename);
            (StatusCode::OK, "Uploaded").into_response()
        }
        Err(err) => {
            log.record(&entry.with_status(err.status()));
            err.into_response()
        }
    }
}

struct StoredUpload {
    filename: String,
    size: u64,
}

async fn store_upload(
    target: &UploadTarget,
    req: Request<AxumBody>,
) -> Result<StoredUpload, ApiError> {
    let mut multipart = Multipart::from_request(req, &()).await.map_err(|err| {
        warn!(error = %err, "rejecting malformed multipart request");
        ApiError::BadRequest(err.body_text())
    })?;

    loop {
        let mut field = multipart
            .next_field()
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to read multipart body");
                ApiError::BadRequest(err.body_text())
            })?
            .ok_or_else(|| {
                ApiError::BadRequest(format!("missing form field {UPLOAD_FIELD:?}"))
            })?;
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let path = target.destination(&filename)?;
        debug!(path = ?path, "writing upload");

        let mut file = File::create(&path)
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        let size = match write_field(&mut file, &mut field, &filename).await {
            Ok(size) => size,
            Err(err) => {
                // 不保留截断的文件
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    warn!(error = %remove_err, path = ?path, "failed to remove partial upload");
                }
                return Err(err);
            }
        };

        return Ok(StoredUpload { filename, size });
    }
}

async fn write_field(
    file: &mut File,
    field: &mut Field<'_>,
    filename: &str,
) -> Result<u64, ApiError> {
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|err| {
        warn!(error = %err, filename = %filename, "upload interrupted");
        ApiError::BadRequest(err.body_text())
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        size += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(size)
}
