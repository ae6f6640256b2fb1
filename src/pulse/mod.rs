//! Ballon d'Or Pulse 客户端核心
//!
//! 远程集合的响应式绑定层：首次拉取、实时订阅、本地乐观更新与释放。

pub mod binding;
pub mod client;
pub mod error;
pub mod models;
pub mod serialization;
pub mod store;
pub mod toast;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出主要类型和函数
pub use binding::CollectionBinding;
pub use client::{ClientConfig, PulseClient, StoreBackend};
pub use error::{with_error_handling, AppError, ErrorKind};
pub use toast::{EmptyToastListener, Toast, ToastListener};
