use {
	tokio::signal,
	tracing::{error, info},
};

/// 等待系统停机信号 返回信号名称
///
/// 信号处理器注册失败时不会立即返回 否则会被当作收到了信号
pub async fn wait_for_signal() -> String {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};
		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(sigterm) => sigterm,
			Err(e) => {
				error!("Failed to create SIGTERM signal handler: {}", e);
				return wait_for_ctrl_c().await;
			}
		};
		tokio::select! {
			name = wait_for_ctrl_c() => name,
			_ = sigterm.recv() => {
				info!("Received SIGTERM");
				"SIGTERM".to_string()
			}
		}
	}
	#[cfg(not(unix))]
	{
		wait_for_ctrl_c().await
	}
}

async fn wait_for_ctrl_c() -> String {
	match signal::ctrl_c().await {
		Ok(()) => {
			info!("Received SIGINT");
			"SIGINT".to_string()
		}
		Err(e) => {
			error!("Failed to listen for SIGINT: {}", e);
			std::future::pending().await
		}
	}
}
