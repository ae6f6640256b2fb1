pub mod pulse;

// 重新导出常用类型和函数，方便外部使用
pub use pulse::{
    binding::CollectionBinding,
    client::{ClientConfig, PulseClient, StoreBackend},
    error::{with_error_handling, AppError, ErrorKind},
    store::{LocalStore, MemoryStore, RemoteStore, Store},
};
