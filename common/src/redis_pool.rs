use {
	crate::consts::{REDIS_CONNECT_ATTEMPTS, REDIS_CONNECT_RETRY_INTERVAL_SECS, REDIS_POOL_MAX_SIZE},
	deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime},
	redis::AsyncCommands,
	std::time::Duration,
	tracing::warn,
};

pub fn redis_url(redis_host: &str, redis_password: Option<&str>, db: u32) -> String {
	format!("redis://{}{}/{}", redis_password.map(|pwd| format!(":{}@", pwd)).unwrap_or_default(), redis_host, db)
}

/// 创建 Redis 连接池并 ping 确认可用 失败按固定间隔重试
pub async fn init_redis_pool(redis_host: &str, redis_password: Option<&str>, db: u32) -> anyhow::Result<Pool> {
	let mut cfg = Config::from_url(redis_url(redis_host, redis_password, db));
	cfg.pool = Some(PoolConfig::new(REDIS_POOL_MAX_SIZE));
	let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

	let mut attempts_left = REDIS_CONNECT_ATTEMPTS;
	loop {
		match ping(&pool).await {
			Ok(()) => return Ok(pool),
			Err(e) if attempts_left > 1 => {
				attempts_left -= 1;
				warn!("Redis is trying to connect ({}), attempts left: {}", e, attempts_left);
				tokio::time::sleep(Duration::from_secs(REDIS_CONNECT_RETRY_INTERVAL_SECS)).await;
			}
			Err(e) => {
				pool.close();
				return Err(anyhow::anyhow!("Redis connect attempts exhausted: {}", e));
			}
		}
	}
}

/// 从连接池获取连接
pub async fn get_connection(pool: &Pool) -> anyhow::Result<Connection> {
	pool.get().await.map_err(|e| anyhow::anyhow!("Failed to get redis connection: {}", e))
}

pub async fn ping(pool: &Pool) -> anyhow::Result<()> {
	get_connection(pool).await?.ping::<()>().await.map_err(|e| anyhow::anyhow!("Redis ping error: {}", e))
}
