pub const COMMON_ENV_PATH: &str = "./deploy/common.env";
pub const TRANSLATION_CONFIG_PATH: &str = "./deploy/translation";

/// 运行模式常量
pub const RUN_MODE_DEV: &str = "dev";
pub const RUN_MODE_PROD: &str = "prod";

/// Redis 连接池
pub const REDIS_POOL_MAX_SIZE: usize = 32;
/// 启动时 ping 的重试次数和间隔
pub const REDIS_CONNECT_ATTEMPTS: u32 = 10;
pub const REDIS_CONNECT_RETRY_INTERVAL_SECS: u64 = 1;

/// PostgreSQL 连接池配置常量
pub const POSTGRES_MAX_CONNECTIONS: u32 = 32;
pub const POSTGRES_MIN_CONNECTIONS: u32 = 1;
pub const POSTGRES_IDLE_TIMEOUT_SECS: u64 = 600;
pub const POSTGRES_MAX_LIFETIME_SECS: u64 = 1800;
pub const POSTGRES_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const POSTGRES_TEST_BEFORE_ACQUIRE: bool = false;

/// 限流规则间隔上限（秒） 换算成毫秒后不会溢出
pub const RATE_LIMIT_MAX_INTERVAL_SECS: i64 = 86_400;

/// OTLP http 默认上报地址
pub const DEFAULT_OTLP_TRACES_URL: &str = "http://localhost:4318/v1/traces";

/// 验证运行模式是否有效
pub fn validate_run_mode(run_mode: &str) -> anyhow::Result<()> {
	match run_mode {
		RUN_MODE_DEV | RUN_MODE_PROD => Ok(()),
		_ => Err(anyhow::anyhow!("Invalid RUN_MODE: {}. Must be either '{}' or '{}'", run_mode, RUN_MODE_DEV, RUN_MODE_PROD)),
	}
}
