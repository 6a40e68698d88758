use {
	futures::{FutureExt, future::BoxFuture},
	std::{
		future::Future,
		panic::AssertUnwindSafe,
		sync::{Arc, Mutex, PoisonError},
		time::Duration,
	},
	tracing::{error, info},
};

type Release = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Resource {
	name: &'static str,
	release: Release,
}

/// 进程级资源（tracer、redis、postgres）的释放登记表
///
/// 获取资源时立刻登记释放动作 guard 结束时按获取的逆序逐个释放 每个只释放一次
/// 释放失败或超时只打日志 不影响原本的返回结果
#[derive(Clone)]
pub struct ResourceScope {
	resources: Arc<Mutex<Vec<Resource>>>,
	release_timeout: Duration,
}

impl ResourceScope {
	pub fn new(release_timeout: Duration) -> Self {
		Self { resources: Arc::new(Mutex::new(Vec::new())), release_timeout }
	}

	pub fn register<F, Fut>(&self, name: &'static str, release: F)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		let release: Release = Box::new(move || release().boxed());
		self.resources.lock().unwrap_or_else(PoisonError::into_inner).push(Resource { name, release });
	}

	/// 已登记但还没释放的资源 按获取顺序
	pub fn names(&self) -> Vec<&'static str> {
		self.resources.lock().unwrap_or_else(PoisonError::into_inner).iter().map(|resource| resource.name).collect()
	}

	/// 逆序释放所有资源 返回释放失败的数量
	pub async fn release_all(&self) -> usize {
		let mut failed = 0;
		loop {
			// 锁不能跨 await
			let resource = self.resources.lock().unwrap_or_else(PoisonError::into_inner).pop();
			let Some(Resource { name, release }) = resource else {
				break;
			};
			match tokio::time::timeout(self.release_timeout, release()).await {
				Ok(Ok(())) => info!("{} released", name),
				Ok(Err(e)) => {
					failed += 1;
					error!("Failed to release {}: {:#}", name, e);
				}
				Err(_) => {
					failed += 1;
					error!("Release of {} timed out after {:?}", name, self.release_timeout);
				}
			}
		}
		failed
	}

	/// 运行 body 无论正常返回、返回错误还是 panic 都会释放已登记的资源
	/// panic 在资源释放后继续向上抛出
	pub async fn guard<T, Fut>(&self, body: Fut) -> anyhow::Result<T>
	where
		Fut: Future<Output = anyhow::Result<T>>,
	{
		let result = AssertUnwindSafe(body).catch_unwind().await;
		if let Ok(Err(e)) = &result {
			error!("Exiting on error: {:#}", e);
		}
		self.release_all().await;
		match result {
			Ok(result) => result,
			Err(panic) => std::panic::resume_unwind(panic),
		}
	}
}
