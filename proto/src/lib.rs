// translation.rs 由 build.rs 根据 translation.proto 生成
mod translation;

pub use translation::*;
