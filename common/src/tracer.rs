use {
	opentelemetry::{KeyValue, global, trace::TracerProvider as _},
	opentelemetry_otlp::{SpanExporter as OtlpSpanExporter, WithExportConfig},
	opentelemetry_sdk::{
		Resource,
		propagation::TraceContextPropagator,
		trace::{Sampler, SdkTracer, SdkTracerProvider, SpanExporter},
	},
	serde::{Deserialize, Serialize},
	tracing::info,
};

/// OTLP 链路追踪配置（用于从 TOML 配置文件反序列化）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TracerConfig {
	pub enabled: bool,
	/// OTLP http 上报地址 例如 http://localhost:4318/v1/traces
	pub url: String,
	pub service_name: String,
}

impl Default for TracerConfig {
	fn default() -> Self {
		Self { enabled: false, url: crate::consts::DEFAULT_OTLP_TRACES_URL.to_string(), service_name: "translation".to_string() }
	}
}

impl TracerConfig {
	/// 检查配置是否有效
	pub fn check(&self) -> anyhow::Result<()> {
		if !self.enabled {
			return Ok(());
		}
		if self.url.is_empty() {
			return Err(anyhow::anyhow!("Tracer url is empty"));
		}
		if self.service_name.is_empty() {
			return Err(anyhow::anyhow!("Tracer service_name is empty"));
		}
		Ok(())
	}
}

/// 进程级的 span 导出器 退出前必须 shutdown 才会把缓冲的 span 发出去
#[derive(Clone)]
pub struct OtlpTracer {
	provider: SdkTracerProvider,
	service_name: String,
}

impl OtlpTracer {
	/// 构造 OTLP http 导出器 并设置为全局 provider 和 W3C trace context 传播器
	pub fn init(config: &TracerConfig, version: &str, environment: &str) -> anyhow::Result<Self> {
		let url = config.url.clone();
		// reqwest 阻塞客户端不能在 tokio 线程里创建
		let exporter = std::thread::spawn(move || OtlpSpanExporter::builder().with_http().with_endpoint(url).build())
			.join()
			.map_err(|_| anyhow::anyhow!("OTLP exporter builder panicked"))??;
		let tracer = Self::with_exporter(exporter, &config.service_name, version, environment);
		info!("OpenTelemetry tracer initialized (exporter: {})", config.url);
		Ok(tracer)
	}

	pub fn with_exporter<E: SpanExporter + 'static>(exporter: E, service_name: &str, version: &str, environment: &str) -> Self {
		let resource = Resource::builder()
			.with_service_name(service_name.to_string())
			.with_attributes([KeyValue::new("service.version", version.to_string()), KeyValue::new("deployment.environment", environment.to_string())])
			.build();
		let provider = SdkTracerProvider::builder().with_batch_exporter(exporter).with_resource(resource).with_sampler(Sampler::AlwaysOn).build();

		global::set_tracer_provider(provider.clone());
		global::set_text_map_propagator(TraceContextPropagator::new());
		Self { provider, service_name: service_name.to_string() }
	}

	/// 给 tracing-opentelemetry 层用的 tracer
	pub fn tracer(&self) -> SdkTracer {
		self.provider.tracer(self.service_name.clone())
	}

	/// 刷出缓冲的 span 并关闭导出器 只能调用一次
	pub async fn shutdown(self) -> anyhow::Result<()> {
		let provider = self.provider;
		tokio::task::spawn_blocking(move || provider.shutdown()).await?.map_err(|e| anyhow::anyhow!("tracer shutdown failed: {}", e))
	}
}
