use {
	std::{future::Future, sync::Arc},
	tokio::{
		sync::{OwnedSemaphorePermit, Semaphore},
		task::JoinSet,
	},
};

/// broker rpc 的并发处理 同时处理的消息数不超过 limit
/// 一条慢请求不会挡住后面的消息 停止时先 drain 已经在处理的
pub struct Inflight {
	permits: Arc<Semaphore>,
	tasks: JoinSet<()>,
}

impl Inflight {
	pub fn new(limit: usize) -> Self {
		Self { permits: Arc::new(Semaphore::new(limit.max(1))), tasks: JoinSet::new() }
	}

	/// 拿到名额之后才去取下一条消息 满了就在这里等
	pub async fn reserve(&mut self) -> anyhow::Result<OwnedSemaphorePermit> {
		while self.tasks.try_join_next().is_some() {}
		Ok(self.permits.clone().acquire_owned().await?)
	}

	pub fn spawn<F>(&mut self, permit: OwnedSemaphorePermit, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		self.tasks.spawn(async move {
			task.await;
			drop(permit);
		});
	}

	/// 还能再接收的消息数
	pub fn available(&self) -> usize {
		self.permits.available_permits()
	}

	/// 等所有在处理的消息完成
	pub async fn drain(&mut self) {
		while self.tasks.join_next().await.is_some() {}
	}
}
