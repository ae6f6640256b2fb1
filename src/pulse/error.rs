//! 错误分类与结果包装
//!
//! 所有绑定操作的最外层保护：捕获底层错误，归类到统一的错误类型，
//! 记录日志、按需弹出提示，并始终以 `Result<T, AppError>` 返回给调用方。

use crate::pulse::store::StoreError;
use crate::pulse::toast::{Toast, ToastListener};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// 无法识别的错误使用的默认提示
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Une erreur inattendue s'est produite";

/// 错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 提交前发现的非法输入
    Validation,
    /// 存储不可达或超时
    Network,
    /// 被存储端的认证拒绝
    Auth,
    /// 变更目标不存在
    NotFound,
    /// 被存储端的访问策略拒绝
    Permission,
    /// 存储端内部错误
    Server,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Auth => "AUTH",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Permission => "PERMISSION",
            ErrorKind::Server => "SERVER",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对外暴露的统一错误
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// 完整的错误链，展示提示时可选附带
    pub details: Option<String>,
    /// 存储端错误码（如 `23505`）或 HTTP 状态码
    pub code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            message: if message.is_empty() {
                UNEXPECTED_ERROR_MESSAGE.to_string()
            } else {
                message
            },
            details: None,
            code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for AppError {}

/// 沿错误链查找已知的底层错误并归类
pub fn classify(err: &anyhow::Error) -> AppError {
    let details = format!("{:#}", err);

    for cause in err.chain() {
        if let Some(app_error) = cause.downcast_ref::<AppError>() {
            return app_error.clone();
        }
        if let Some(store_error) = cause.downcast_ref::<StoreError>() {
            return store_error.to_app_error().with_details(details);
        }
        if let Some(http_error) = cause.downcast_ref::<reqwest::Error>() {
            let kind = if http_error.is_status() {
                ErrorKind::Server
            } else {
                ErrorKind::Network
            };
            let app_error = AppError::new(kind, http_error.to_string()).with_details(details);
            return match http_error.status() {
                Some(status) => app_error.with_code(status.as_u16().to_string()),
                None => app_error,
            };
        }
        if let Some(db_error) = cause.downcast_ref::<sqlx::Error>() {
            let kind = match db_error {
                sqlx::Error::RowNotFound => ErrorKind::NotFound,
                _ => ErrorKind::Server,
            };
            return AppError::new(kind, db_error.to_string()).with_details(details);
        }
        if let Some(json_error) = cause.downcast_ref::<serde_json::Error>() {
            return AppError::validation(json_error.to_string()).with_details(details);
        }
    }

    AppError::new(ErrorKind::Unknown, err.to_string()).with_details(details)
}

/// 记录并归类错误
pub fn handle(err: &anyhow::Error, context: &str) -> AppError {
    error!("[Error] ❌ {} 出错: {:#}", context, err);
    classify(err)
}

/// 执行可能失败的异步操作，失败时归类、记录并按需弹出提示
///
/// 永远不会把错误以 panic 的形式抛给调用方。
pub async fn with_error_handling<T, F>(
    context: &str,
    toasts: Option<&Arc<dyn ToastListener>>,
    operation: F,
) -> Result<T, AppError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match operation.await {
        Ok(data) => Ok(data),
        Err(err) => {
            let app_error = handle(&err, context);
            if let Some(listener) = toasts {
                listener.on_toast(Toast::from_error(&app_error, false)).await;
            }
            Err(app_error)
        }
    }
}
