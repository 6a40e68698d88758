pub mod common_env;
pub mod consts;
pub mod graceful;
pub mod logging;
pub mod metrics;
pub mod postgres_pool;
pub mod rate_limit;
pub mod redis_pool;
pub mod tracer;
