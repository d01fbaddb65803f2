//! TLS 证书校验与加载。

use axum_server::tls_rustls::RustlsConfig;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StartupError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// 证书与私钥都必须是已存在的文件，在绑定端口之前检查。
pub fn validate_tls_paths(paths: &TlsPaths) -> Result<(), StartupError> {
    for path in [&paths.cert, &paths.key] {
        ensure_file(path)?;
    }
    Ok(())
}

fn ensure_file(path: &Path) -> Result<(), StartupError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(StartupError::Tls(format!("{} is not a file", path.display()))),
        Err(err) => Err(StartupError::Tls(format!("{}: {err}", path.display()))),
    }
}

/// 校验并构建 Rustls 配置。
pub async fn build_rustls_config(paths: &TlsPaths) -> Result<RustlsConfig, StartupError> {
    validate_tls_paths(paths)?;
    let config = RustlsConfig::from_pem_file(&paths.cert, &paths.key)
        .await
        .map_err(|err| StartupError::Tls(err.to_string()))?;
    info!(cert = ?paths.cert, key = ?paths.key, "loaded TLS certificate");
    Ok(config)
}
