// translation 服务库入口
// 导出所有需要在测试中使用的模块

pub mod amqp_rpc;
pub mod app;
pub mod cache;
pub mod config;
pub mod consts;
pub mod db;
pub mod entity;
pub mod grpc_server;
pub mod http_server;
pub mod inflight;
pub mod init;
pub mod nats_rpc;
pub mod orchestrator;
pub mod resources;
pub mod router;
pub mod rpc_router;
pub mod service;
pub mod slot;
pub mod usecase;
pub mod webapi;
