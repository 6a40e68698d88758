//! 可管理服务的生命周期能力 start / notify / shutdown
//!
//! 每个 transport（http、grpc、amqp rpc、nats rpc）都实现 [`ManageableService`]，
//! 编排器只通过这个 trait 操作它们，不关心具体协议。

use {
	async_trait::async_trait,
	futures::{FutureExt, future::BoxFuture},
	std::{future::Future, time::Duration},
	tokio::{sync::oneshot, task::JoinHandle},
	tracing::{error, warn},
};

/// 服务在运行期间最多发出一次的退出事件
#[derive(Debug)]
pub enum ServiceExit {
	/// 服务内部出错
	Failed(anyhow::Error),
	/// 服务循环自己结束了（没有收到停机请求）
	Terminated,
}

/// 一次性信号源 最多完成一次
pub type Notify = BoxFuture<'static, ServiceExit>;

/// 永不完成的信号源 用于未启用的服务或重复获取 notify
pub fn silent_notify() -> Notify {
	futures::future::pending().boxed()
}

#[async_trait]
pub trait ManageableService: Send {
	/// 开始接收请求 不阻塞调用方 重复调用无效果
	/// 启动后的任何错误只通过 notify 报告
	fn start(&mut self);

	/// 取出信号源 只有第一次调用会拿到真正的信号 之后返回永不完成的信号
	fn notify(&mut self) -> Notify;

	/// 停止接收新请求并在 deadline 内结束
	async fn shutdown(&mut self, deadline: Duration) -> anyhow::Result<()>;
}

/// 后台任务的通用外壳 把一个带停机信号的循环包装成 start/notify/shutdown
pub struct ServiceTask {
	name: &'static str,
	notify_tx: Option<oneshot::Sender<anyhow::Error>>,
	notify_rx: Option<oneshot::Receiver<anyhow::Error>>,
	shutdown_tx: Option<oneshot::Sender<()>>,
	handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl ServiceTask {
	pub fn new(name: &'static str) -> Self {
		let (notify_tx, notify_rx) = oneshot::channel();
		Self { name, notify_tx: Some(notify_tx), notify_rx: Some(notify_rx), shutdown_tx: None, handle: None }
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn is_started(&self) -> bool {
		self.notify_tx.is_none()
	}

	/// 在独立的 tokio task 上运行 run 返回 false 表示已经启动过
	///
	/// run 收到停机信号后应尽快返回 Ok
	/// 运行期间返回错误时通过 notify 发出 如果已经没人监听（停机阶段）就作为 task 结果返回给 stop
	pub fn spawn<F, Fut>(&mut self, run: F) -> bool
	where
		F: FnOnce(oneshot::Receiver<()>) -> Fut,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		let Some(notify_tx) = self.notify_tx.take() else {
			warn!("{} already started", self.name);
			return false;
		};
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		self.shutdown_tx = Some(shutdown_tx);

		let name = self.name;
		let fut = run(shutdown_rx);
		self.handle = Some(tokio::spawn(async move {
			match fut.await {
				Ok(()) => Ok(()),
				Err(e) => {
					error!("{} stopped with error: {:#}", name, e);
					notify_tx.send(e)
				}
			}
		}));
		true
	}

	pub fn notify(&mut self) -> Notify {
		match self.notify_rx.take() {
			Some(rx) => async move {
				match rx.await {
					Ok(e) => ServiceExit::Failed(e),
					Err(_) => ServiceExit::Terminated,
				}
			}
			.boxed(),
			None => silent_notify(),
		}
	}

	/// 发送停机信号并等待 task 结束 超过 deadline 直接 abort
	pub async fn stop(&mut self, deadline: Duration) -> anyhow::Result<()> {
		if let Some(shutdown_tx) = self.shutdown_tx.take() {
			let _ = shutdown_tx.send(());
		}
		let Some(handle) = self.handle.as_mut() else {
			return Ok(());
		};

		let joined = tokio::time::timeout(deadline, &mut *handle).await;
		let result = match joined {
			Ok(Ok(result)) => result,
			Ok(Err(e)) => Err(anyhow::anyhow!("{} task join error: {}", self.name, e)),
			Err(_) => {
				handle.abort();
				Err(anyhow::anyhow!("{} did not stop within {:?}, aborted", self.name, deadline))
			}
		};
		self.handle = None;
		result
	}
}

impl Drop for ServiceTask {
	// 停机超时被外层取消时 task 还留在这里 进程退出前 abort 掉
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}
