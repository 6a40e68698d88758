use {
	crate::{
		cache::HistoryCache,
		consts::DEFAULT_HISTORY_LIMIT,
		entity::{AppError, TranslateRequest, Translation as TranslationRecord, TranslationHistory},
	},
	anyhow::Context,
	async_trait::async_trait,
	std::sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	tracing::warn,
};

/// 所有 transport 调用的业务能力
#[async_trait]
pub trait Translation: Send + Sync {
	async fn history(&self) -> Result<TranslationHistory, AppError>;
	async fn translate(&self, request: TranslateRequest) -> Result<TranslationRecord, AppError>;
}

/// 翻译历史存储
#[async_trait]
pub trait TranslationRepo: Send + Sync {
	async fn get_history(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<TranslationRecord>>;
	async fn store(&self, translation: &TranslationRecord) -> anyhow::Result<()>;
}

/// 外部翻译服务
#[async_trait]
pub trait TranslationWebApi: Send + Sync {
	async fn translate(&self, request: &TranslateRequest) -> anyhow::Result<TranslationRecord>;
}

pub struct TranslationUseCase<R, W> {
	repo: R,
	web_api: W,
	cache: Option<Arc<dyn HistoryCache>>,
	// 每次写入新翻译加一 读库期间有写入时不回填缓存
	generation: AtomicU64,
}

impl<R: TranslationRepo, W: TranslationWebApi> TranslationUseCase<R, W> {
	pub fn new(repo: R, web_api: W, cache: Option<Arc<dyn HistoryCache>>) -> Self {
		Self { repo, web_api, cache, generation: AtomicU64::new(0) }
	}

	async fn fill_cache(&self, cache: &dyn HistoryCache, history: &TranslationHistory, read_generation: u64) {
		if self.generation.load(Ordering::SeqCst) != read_generation {
			return;
		}
		if let Err(e) = cache.set(history).await {
			warn!("History cache write failed: {:#}", e);
			return;
		}
		// set 和并发的 invalidate 交错时 回填的可能是旧列表 再删一次
		if self.generation.load(Ordering::SeqCst) != read_generation
			&& let Err(e) = cache.invalidate().await
		{
			warn!("History cache invalidate failed: {:#}", e);
		}
	}
}

#[async_trait]
impl<R: TranslationRepo, W: TranslationWebApi> Translation for TranslationUseCase<R, W> {
	/// 先查缓存 缓存出错只打日志然后回源
	async fn history(&self) -> Result<TranslationHistory, AppError> {
		if let Some(cache) = &self.cache {
			match cache.get().await {
				Ok(Some(history)) => return Ok(history),
				Ok(None) => {}
				Err(e) => warn!("History cache read failed: {:#}", e),
			}
		}

		let read_generation = self.generation.load(Ordering::SeqCst);
		let history = self.repo.get_history(DEFAULT_HISTORY_LIMIT, 0).await.context("TranslationUseCase - history - repo.get_history").map_err(AppError::Internal)?;
		let history = TranslationHistory { history };

		if let Some(cache) = &self.cache {
			self.fill_cache(cache.as_ref(), &history, read_generation).await;
		}
		Ok(history)
	}

	async fn translate(&self, request: TranslateRequest) -> Result<TranslationRecord, AppError> {
		request.validate()?;

		let translation = self.web_api.translate(&request).await.context("TranslationUseCase - translate - web_api.translate").map_err(AppError::ExternalService)?;
		self.repo.store(&translation).await.context("TranslationUseCase - translate - repo.store").map_err(AppError::Internal)?;
		self.generation.fetch_add(1, Ordering::SeqCst);

		if let Some(cache) = &self.cache
			&& let Err(e) = cache.invalidate().await
		{
			warn!("History cache invalidate failed: {:#}", e);
		}
		Ok(translation)
	}
}
