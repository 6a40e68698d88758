use {
	serde::{Deserialize, Serialize},
	sqlx::{PgPool, postgres::PgPoolOptions},
	std::time::Duration,
	tracing::info,
};

/// PostgreSQL 连接池配置
#[derive(Debug, Clone)]
pub struct PostgresPoolConfig {
	pub max_connections: u32,
	pub min_connections: u32,
	pub idle_timeout: Duration,
	pub max_lifetime: Duration,
	pub acquire_timeout: Duration,
	pub test_before_acquire: bool,
}

/// 连接参数
#[derive(Debug, Clone)]
pub struct PostgresEndpoint<'a> {
	pub host: &'a str,
	pub port: u16,
	pub user: &'a str,
	pub password: &'a str,
	pub database: &'a str,
}

impl PostgresEndpoint<'_> {
	pub fn url(&self) -> String {
		format!("postgres://{}:{}@{}:{}/{}", self.user, self.password, self.host, self.port, self.database)
	}
}

/// 初始化 PostgreSQL 连接池 并用 SELECT 1 探活
pub async fn init_postgres_pool(endpoint: &PostgresEndpoint<'_>, config: PostgresPoolConfig) -> anyhow::Result<PgPool> {
	let pool = PgPoolOptions::new()
		.max_connections(config.max_connections)
		.min_connections(config.min_connections)
		.acquire_timeout(config.acquire_timeout)
		.test_before_acquire(config.test_before_acquire)
		.idle_timeout(config.idle_timeout)
		.max_lifetime(config.max_lifetime)
		.connect(&endpoint.url())
		.await?;

	sqlx::query("SELECT 1").execute(&pool).await?;

	info!("PostgreSQL pool initialized: {}:{}/{} (max: {}, min: {})", endpoint.host, endpoint.port, endpoint.database, config.max_connections, config.min_connections);
	Ok(pool)
}

/// PostgreSQL 配置文件结构体（用于从 TOML 配置文件反序列化）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
	pub max_connections: u32,
	pub min_connections: u32,
	pub idle_timeout_secs: u64,
	pub max_lifetime_secs: u64,
	#[serde(default = "default_acquire_timeout_secs")]
	pub acquire_timeout_secs: u64,
	#[serde(default)]
	pub test_before_acquire: bool,
}

fn default_acquire_timeout_secs() -> u64 {
	crate::consts::POSTGRES_ACQUIRE_TIMEOUT_SECS
}

impl Default for PostgresConfig {
	fn default() -> Self {
		use crate::consts::*;
		Self {
			max_connections: POSTGRES_MAX_CONNECTIONS,
			min_connections: POSTGRES_MIN_CONNECTIONS,
			idle_timeout_secs: POSTGRES_IDLE_TIMEOUT_SECS,
			max_lifetime_secs: POSTGRES_MAX_LIFETIME_SECS,
			acquire_timeout_secs: POSTGRES_ACQUIRE_TIMEOUT_SECS,
			test_before_acquire: POSTGRES_TEST_BEFORE_ACQUIRE,
		}
	}
}

impl PostgresConfig {
	/// 检查配置是否有效
	pub fn check(&self) -> anyhow::Result<()> {
		if self.max_connections == 0 {
			return Err(anyhow::anyhow!("Postgres max_connections must be greater than 0"));
		}
		if self.min_connections > self.max_connections {
			return Err(anyhow::anyhow!("Postgres min_connections must not exceed max_connections"));
		}
		if self.idle_timeout_secs == 0 {
			return Err(anyhow::anyhow!("Postgres idle_timeout_secs must be greater than 0"));
		}
		if self.max_lifetime_secs == 0 {
			return Err(anyhow::anyhow!("Postgres max_lifetime_secs must be greater than 0"));
		}
		if self.acquire_timeout_secs == 0 {
			return Err(anyhow::anyhow!("Postgres acquire_timeout_secs must be greater than 0"));
		}
		Ok(())
	}

	pub fn pool_config(&self) -> PostgresPoolConfig {
		PostgresPoolConfig {
			max_connections: self.max_connections,
			min_connections: self.min_connections,
			idle_timeout: Duration::from_secs(self.idle_timeout_secs),
			max_lifetime: Duration::from_secs(self.max_lifetime_secs),
			acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
			test_before_acquire: self.test_before_acquire,
		}
	}
}
