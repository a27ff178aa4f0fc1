// 应用核心库

// 模块导出
pub mod config;
pub mod server;
pub mod upstream;
pub mod utils;
