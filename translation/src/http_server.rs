use {
	crate::{
		config::AppConfig,
		router,
		service::{ManageableService, Notify, ServiceTask},
		usecase::Translation,
	},
	async_trait::async_trait,
	axum::Router,
	common::rate_limit::{RateLimiter, rate_limit_gc},
	std::{net::SocketAddr, sync::Arc, time::Duration},
	tokio::net::TcpListener,
	tracing::info,
};

/// http 主入口 构造时绑定端口 start 之后才开始 accept
pub struct HttpServer {
	task: ServiceTask,
	pending: Option<(TcpListener, Router, Arc<RateLimiter>)>,
	local_addr: SocketAddr,
}

impl HttpServer {
	pub async fn bind(config: &AppConfig, usecase: Arc<dyn Translation>) -> anyhow::Result<Self> {
		let (app, rate_limiter) = router::app(usecase, config)?;
		let addr = config.http.get_addr();
		let listener = TcpListener::bind(&addr).await.map_err(|e| anyhow::anyhow!("failed to bind http listener {}: {}", addr, e))?;
		let local_addr = listener.local_addr()?;
		Ok(Self { task: ServiceTask::new("http"), pending: Some((listener, app, rate_limiter)), local_addr })
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}
}

#[async_trait]
impl ManageableService for HttpServer {
	fn start(&mut self) {
		let Some((listener, app, rate_limiter)) = self.pending.take() else {
			return;
		};
		let local_addr = self.local_addr;
		self.task.spawn(move |shutdown_rx| async move {
			info!("🚀 HTTP server is running at {}", local_addr);
			let gc = tokio::spawn(rate_limit_gc(rate_limiter));
			// 使用 axum 的 with_graceful_shutdown 实现优雅停机
			let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
				.with_graceful_shutdown(async move {
					let _ = shutdown_rx.await;
				})
				.await;
			gc.abort();
			info!("HTTP server stopped");
			served.map_err(|e| anyhow::anyhow!("http server error: {}", e))
		});
	}

	fn notify(&mut self) -> Notify {
		self.task.notify()
	}

	async fn shutdown(&mut self, deadline: Duration) -> anyhow::Result<()> {
		// 未启动时直接释放 listener
		self.pending = None;
		self.task.stop(deadline).await
	}
}
