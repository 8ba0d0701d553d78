/// Stream Relay 库入口
///
/// 将核心模块导出为库，方便测试和复用
pub mod compress;
pub mod config;
pub mod error;
pub mod limited_reader;
pub mod pump;
pub mod relay;
pub mod stats;
pub mod tls;

// 重新导出常用类型
pub use compress::{DeflateWriter, FlushWrite};
pub use config::RelayConfig;
pub use error::{CopyError, RelayError};
pub use limited_reader::LimitedReader;
pub use pump::{copy_with_flush, copy_with_flush_bounded, DEFAULT_COPY_BUF_SIZE};
pub use stats::{RelayStats, RelayStatsTracker};
