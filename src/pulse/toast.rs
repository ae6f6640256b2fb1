//! 一次性提示（toast）回调接口

use crate::pulse::error::{AppError, ErrorKind};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Success,
    Info,
}

/// 交给 UI 层展示的一次性提示
#[derive(Debug, Clone)]
pub struct Toast {
    pub severity: Severity,
    pub message: String,
    pub description: Option<String>,
    pub duration: Duration,
}

impl Toast {
    /// 校验类错误的展示时长
    pub const VALIDATION_DURATION: Duration = Duration::from_millis(4000);
    /// 其他错误的展示时长
    pub const DEFAULT_DURATION: Duration = Duration::from_millis(6000);

    /// 根据错误生成提示；`show_details` 为 true 时附带错误详情
    pub fn from_error(error: &AppError, show_details: bool) -> Self {
        let duration = if error.kind == ErrorKind::Validation {
            Self::VALIDATION_DURATION
        } else {
            Self::DEFAULT_DURATION
        };
        Self {
            severity: Severity::Error,
            message: error.message.clone(),
            description: if show_details {
                error.details.clone()
            } else {
                None
            },
            duration,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            description: None,
            duration: Self::VALIDATION_DURATION,
        }
    }
}

/// 提示监听器（由 UI 层实现）
#[async_trait]
pub trait ToastListener: Send + Sync {
    async fn on_toast(&self, toast: Toast);
}

/// 空实现（默认监听器）
pub struct EmptyToastListener;

#[async_trait]
impl ToastListener for EmptyToastListener {
    async fn on_toast(&self, _toast: Toast) {}
}

/// 只写日志的监听器，CLI 使用
pub struct LogToastListener;

#[async_trait]
impl ToastListener for LogToastListener {
    async fn on_toast(&self, toast: Toast) {
        match toast.severity {
            Severity::Error => warn!(
                "[Toast] 🔔 {} ({}ms){}",
                toast.message,
                toast.duration.as_millis(),
                toast
                    .description
                    .map(|d| format!(" - {}", d))
                    .unwrap_or_default()
            ),
            _ => info!("[Toast] 🔔 {}", toast.message),
        }
    }
}
