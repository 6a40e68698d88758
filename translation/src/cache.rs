use {
	crate::{consts::HISTORY_CACHE_KEY, entity::TranslationHistory},
	async_trait::async_trait,
	common::redis_pool,
	deadpool_redis::Pool,
	redis::AsyncCommands,
};

/// 历史记录缓存 失败由调用方决定是否忽略
#[async_trait]
pub trait HistoryCache: Send + Sync {
	async fn get(&self) -> anyhow::Result<Option<TranslationHistory>>;
	async fn set(&self, history: &TranslationHistory) -> anyhow::Result<()>;
	async fn invalidate(&self) -> anyhow::Result<()>;
}

/// 整个历史列表序列化成 json 存一个 key
pub struct RedisHistoryCache {
	pool: Pool,
	ttl_secs: u64,
}

impl RedisHistoryCache {
	pub fn new(pool: Pool, ttl_secs: u64) -> Self {
		Self { pool, ttl_secs }
	}
}

#[async_trait]
impl HistoryCache for RedisHistoryCache {
	async fn get(&self) -> anyhow::Result<Option<TranslationHistory>> {
		let mut conn = redis_pool::get_connection(&self.pool).await?;
		let value: Option<String> = conn.get(HISTORY_CACHE_KEY).await?;
		match value {
			Some(json) => Ok(Some(serde_json::from_str(&json)?)),
			None => Ok(None),
		}
	}

	async fn set(&self, history: &TranslationHistory) -> anyhow::Result<()> {
		let json = serde_json::to_string(history)?;
		let mut conn = redis_pool::get_connection(&self.pool).await?;
		let _: () = conn.set_ex(HISTORY_CACHE_KEY, json, self.ttl_secs).await?;
		Ok(())
	}

	async fn invalidate(&self) -> anyhow::Result<()> {
		let mut conn = redis_pool::get_connection(&self.pool).await?;
		let _: () = conn.del(HISTORY_CACHE_KEY).await?;
		Ok(())
	}
}
