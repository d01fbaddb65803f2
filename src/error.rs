//! 统一的请求错误与启动错误类型。

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::process::ExitCode;

pub const BASIC_AUTH_CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// 单个请求范围内的错误，进程继续运行。
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => (status, msg).into_response(),
            ApiError::Unauthorized => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(BASIC_AUTH_CHALLENGE),
                );
                (status, headers, "Unauthorized").into_response()
            }
            ApiError::Forbidden => (status, "Forbidden").into_response(),
        }
    }
}

/// 启动阶段的致命错误，每种对应一个进程退出码。
#[derive(Debug)]
pub enum StartupError {
    /// 证书或私钥缺失、无法加载。
    Tls(String),
    InvalidAddress(String),
    Bind(std::io::Error),
}

impl StartupError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    pub fn code(&self) -> u8 {
        match self {
            StartupError::Bind(_) => 1,
            StartupError::InvalidAddress(_) => 2,
            StartupError::Tls(_) => 3,
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Tls(detail) => write!(
                f,
                "please provide both a valid certificate and key to use the TLS option: {detail}"
            ),
            StartupError::InvalidAddress(detail) => write!(f, "invalid bind address: {detail}"),
            StartupError::Bind(err) => write!(f, "server failed: {err}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Bind(err) => Some(err),
            _ => None,
        }
    }
}
