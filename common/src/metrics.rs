//! Prometheus 指标
//!
//! - `http_requests_total` (counter): 按 method、path、status 统计请求数
//! - `http_request_duration_seconds` (histogram): 请求耗时

use {
	metrics::Label,
	metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle},
	std::{sync::OnceLock, time::Instant},
	tracing::warn,
};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// 安装全局 prometheus recorder 进程内只安装一次 之后返回同一个 handle
pub fn init_prometheus() -> PrometheusHandle {
	PROMETHEUS
		.get_or_init(|| {
			let recorder = PrometheusBuilder::new().build_recorder();
			let handle = recorder.handle();
			if let Err(e) = metrics::set_global_recorder(recorder) {
				warn!("Global metrics recorder already installed: {}", e);
			}
			handle
		})
		.clone()
}

pub fn record_request(method: &str, path: &str, status: u16, started: Instant) {
	let labels = vec![Label::new("method", method.to_string()), Label::new("path", path.to_string())];
	metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, labels.clone()).record(started.elapsed().as_secs_f64());

	let mut labels = labels;
	labels.push(Label::new("status", status.to_string()));
	metrics::counter!(HTTP_REQUESTS_TOTAL, labels).increment(1);
}
