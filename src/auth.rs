//! Basic 认证：凭据解析与常量时间比较。

use axum::extract::Extension;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::{body::Body as AxumBody, middleware};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Basic};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::access_log::{AccessLog, LoggedRequest};
use crate::error::ApiError;

/// 启动时从 `user:pass` 解析的凭据，进程生命周期内不变。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// 比较提交的凭据。
    ///
    /// 两侧先做 SHA-256 摘要再用 `ct_eq` 比较，耗时与公共前缀长度及输入长度无关；
    /// 用户名与密码两次比较都会执行。
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_match = digest(username)
            .as_slice()
            .ct_eq(digest(&self.username).as_slice());
        let pass_match = digest(password)
            .as_slice()
            .ct_eq(digest(&self.password).as_slice());
        (user_match & pass_match).into()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl FromStr for Credentials {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (username, password) = value
            .split_once(':')
            .ok_or_else(|| "expected credentials in the form user:pass".to_string())?;
        if username.is_empty() {
            return Err("username must not be empty".into());
        }
        Ok(Self::new(username, password))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 认证中间件：凭据缺失或不匹配时返回 401 并记录访问日志，不调用内层处理器。
pub async fn require_basic_auth(
    Extension(credentials): Extension<Arc<Credentials>>,
    Extension(log): Extension<AccessLog>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, ApiError> {
    if let Some(supplied) = req.headers().typed_get::<Authorization<Basic>>()
        && credentials.verify(supplied.username(), supplied.password())
    {
        return Ok(next.run(req).await);
    }

    log.record(&LoggedRequest::start(&req).with_status(StatusCode::UNAUTHORIZED));
    Err(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderValue, header};
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    use crate::colour::Palette;
    use crate::error::BASIC_AUTH_CHALLENGE;

    fn guarded_app(calls: Arc<AtomicUsize>, log: AccessLog) -> Router {
        Router::new()
            .route(
                "/secret",
                get(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { "ok" }
                }),
            )
            .layer(middleware::from_fn(require_basic_auth))
            .layer(Extension(Arc::new(Credentials::new("admin", "hunter2"))))
            .layer(Extension(log))
    }

    fn request_with(auth: Option<Authorization<Basic>>) -> Request<AxumBody> {
        let mut req = Request::builder()
            .uri("/secret")
            .body(AxumBody::empty())
            .expect("request");
        if let Some(auth) = auth {
            req.headers_mut().typed_insert(auth);
        }
        req
    }

    #[test]
    fn parses_user_pass() {
        let creds: Credentials = "admin:pa:ss".parse().expect("credentials");
        assert_eq!(creds, Credentials::new("admin", "pa:ss"));
        assert!("admin".parse::<Credentials>().is_err());
        assert!(":secret".parse::<Credentials>().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn verify_requires_both_fields() {
        let creds = Credentials::new("admin", "hunter2");
        assert!(creds.verify("admin", "hunter2"));
        assert!(!creds.verify("admin", "hunter"));
        assert!(!creds.verify("admin", "hunter22"));
        assert!(!creds.verify("admi", "hunter2"));
        assert!(!creds.verify("", ""));
        assert!(!creds.verify("hunter2", "admin"));
    }

    #[tokio::test]
    async fn matching_credentials_reach_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (log, lines) = AccessLog::memory(Palette::new(false));
        let app = guarded_app(calls.clone(), log);

        let response = app
            .oneshot(request_with(Some(Authorization::basic("admin", "hunter2"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_credentials_are_rejected() {
        for (user, pass) in [("admin", "wrong"), ("root", "hunter2"), ("", "")] {
            let calls = Arc::new(AtomicUsize::new(0));
            let (log, lines) = AccessLog::memory(Palette::new(false));
            let app = guarded_app(calls.clone(), log);

            let response = app
                .oneshot(request_with(Some(Authorization::basic(user, pass))))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            let lines = lines.lock().unwrap();
            assert_eq!(lines.as_slice(), ["unknown | 401 | GET /secret | -"]);
        }
    }

    #[tokio::test]
    async fn missing_or_malformed_header_gets_challenge() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (log, _lines) = AccessLog::memory(Palette::new(false));
        let app = guarded_app(calls.clone(), log);

        let response = app.clone().oneshot(request_with(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            BASIC_AUTH_CHALLENGE
        );

        let mut req = request_with(None);
        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
