use {
	crate::{consts::DEFAULT_SHUTDOWN_TIMEOUT_SECS, slot::TransportFlags},
	common::{common_env::CommonEnv, consts::RATE_LIMIT_MAX_INTERVAL_SECS, logging::LoggingConfig, postgres_pool::PostgresConfig, tracer::TracerConfig},
	config::{Config, Environment, File},
	serde::{Deserialize, Serialize},
	std::time::Duration,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	pub app: AppInfo,
	pub logging: LoggingConfig,
	pub http: HttpConfig,
	pub grpc: GrpcConfig,
	pub amqp: AmqpConfig,
	pub nats: NatsConfig,
	#[serde(default)]
	pub redis: RedisConfig,
	#[serde(default)]
	pub postgres: PostgresConfig,
	#[serde(default)]
	pub rate_limit: RateLimitConfig,
	#[serde(default)]
	pub cors: CorsConfig,
	#[serde(default)]
	pub shutdown: ShutdownConfig,
	#[serde(default)]
	pub metrics: MetricsConfig,
	#[serde(default)]
	pub tracer: TracerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppInfo {
	pub name: String,
	pub version: String,
}

/// http 是主入口 始终启用 没有 enabled 开关
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
	pub port: u16,
	/// 只有部署在可信反向代理后面才打开 否则客户端可以伪造 X-Real-IP / X-Forwarded-For 绕过限流
	#[serde(default)]
	pub trust_proxy_headers: bool,
}

impl HttpConfig {
	pub fn get_addr(&self) -> String {
		format!("0.0.0.0:{}", self.port)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrpcConfig {
	pub enabled: bool,
	pub port: u16,
}

impl GrpcConfig {
	pub fn get_addr(&self) -> String {
		format!("0.0.0.0:{}", self.port)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AmqpConfig {
	pub enabled: bool,
	pub server_exchange: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NatsConfig {
	pub enabled: bool,
	pub server_subject: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
	pub enabled: bool,
	pub history_ttl_secs: u64,
}

impl Default for RedisConfig {
	fn default() -> Self {
		Self { enabled: false, history_ttl_secs: 60 }
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
	pub max: u32,
	pub interval_secs: i64,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { max: 100, interval_secs: 60 }
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// 逗号分隔 "*" 表示任意来源
	pub allow_origins: String,
}

impl Default for CorsConfig {
	fn default() -> Self {
		Self { allow_origins: "*".to_string() }
	}
}

/// prometheus 指标 开启后挂载 /metrics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
	pub enabled: bool,
}

impl Default for MetricsConfig {
	fn default() -> Self {
		Self { enabled: true }
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
	pub timeout_secs: u64,
}

impl Default for ShutdownConfig {
	fn default() -> Self {
		Self { timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS }
	}
}

impl ShutdownConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl AppConfig {
	pub fn transport_flags(&self) -> TransportFlags {
		TransportFlags { amqp_rpc: self.amqp.enabled, nats_rpc: self.nats.enabled, grpc: self.grpc.enabled, http: true }
	}

	/// 检查配置是否有效
	pub fn check(&self) -> anyhow::Result<()> {
		self.logging.check()?;
		self.postgres.check()?;
		self.tracer.check()?;
		if self.app.name.is_empty() {
			return Err(anyhow::anyhow!("App name is empty"));
		}
		if self.http.port == 0 {
			return Err(anyhow::anyhow!("HTTP port must be greater than 0"));
		}
		if self.grpc.enabled {
			if self.grpc.port == 0 {
				return Err(anyhow::anyhow!("gRPC port must be greater than 0"));
			}
			if self.grpc.port == self.http.port {
				return Err(anyhow::anyhow!("gRPC port {} conflicts with HTTP port", self.grpc.port));
			}
		}
		if self.amqp.enabled && self.amqp.server_exchange.is_empty() {
			return Err(anyhow::anyhow!("AMQP server_exchange is empty"));
		}
		if self.nats.enabled && self.nats.server_subject.is_empty() {
			return Err(anyhow::anyhow!("NATS server_subject is empty"));
		}
		if self.redis.enabled && self.redis.history_ttl_secs == 0 {
			return Err(anyhow::anyhow!("Redis history_ttl_secs must be greater than 0"));
		}
		if self.rate_limit.max == 0 || self.rate_limit.interval_secs <= 0 {
			return Err(anyhow::anyhow!("Rate limit max and interval_secs must be greater than 0"));
		}
		if self.rate_limit.interval_secs > RATE_LIMIT_MAX_INTERVAL_SECS {
			return Err(anyhow::anyhow!("Rate limit interval_secs must not exceed {}", RATE_LIMIT_MAX_INTERVAL_SECS));
		}
		if self.shutdown.timeout_secs == 0 {
			return Err(anyhow::anyhow!("Shutdown timeout_secs must be greater than 0"));
		}
		Ok(())
	}

	/// 启用的 transport 和 redis 需要的连接串必须存在
	pub fn check_env(&self, env: &CommonEnv) -> anyhow::Result<()> {
		if self.amqp.enabled && env.amqp_url.is_empty() {
			return Err(anyhow::anyhow!("AMQP is enabled but AMQP_URL is empty"));
		}
		if self.nats.enabled && env.nats_url.is_empty() {
			return Err(anyhow::anyhow!("NATS is enabled but NATS_URL is empty"));
		}
		if self.redis.enabled && env.redis_host.is_empty() {
			return Err(anyhow::anyhow!("Redis is enabled but REDIS_HOST is empty"));
		}
		Ok(())
	}
}

/// 读取 {config_path}/{run_mode}.toml 再用 TRANSLATION_ 前缀的环境变量覆盖
/// 例如 TRANSLATION_GRPC__ENABLED=false
pub fn load_config(config_path: &str, run_mode: &str) -> anyhow::Result<AppConfig> {
	let config = Config::builder()
		.add_source(File::with_name(&format!("{}/{}", config_path, run_mode)).required(true))
		.add_source(Environment::with_prefix("TRANSLATION").prefix_separator("_").separator("__").try_parsing(true))
		.build()?;

	let app_config: AppConfig = config.try_deserialize()?;
	println!("Configuration loaded for mode: {}", run_mode);
	println!("Configuration: {:?}", app_config);
	app_config.check()?;
	Ok(app_config)
}
