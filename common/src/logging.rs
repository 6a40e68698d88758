use {
	opentelemetry_sdk::trace::SdkTracer,
	serde::{Deserialize, Serialize},
	std::{io, path::Path},
	tracing::info,
	tracing_appender::{
		non_blocking::WorkerGuard,
		rolling::{RollingFileAppender, Rotation},
	},
	tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// 日志配置结构体（用于从 TOML 配置文件反序列化）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
	pub level: String,
	pub file: Option<String>,
	pub console: bool,
	pub rotation_max_files: usize,
}

impl LoggingConfig {
	/// 检查配置是否有效
	pub fn check(&self) -> anyhow::Result<()> {
		if self.level.is_empty() {
			return Err(anyhow::anyhow!("Logging level is empty"));
		}
		if self.file.is_none() && !self.console {
			return Err(anyhow::anyhow!("Logging file and console are both empty"));
		}
		if !self.console && self.rotation_max_files == 0 {
			return Err(anyhow::anyhow!("Logging rotation_max_files must be greater than 0"));
		}
		Ok(())
	}
}

/// 按配置初始化日志 终端和文件二选一 终端优先
/// 文件日志返回 WorkerGuard 由调用方持有 drop 时把缓冲区刷到文件
/// 传入 otel tracer 时 span 同时导出到 OTLP
pub fn init_logging(config: &LoggingConfig, otel: Option<SdkTracer>) -> anyhow::Result<Option<WorkerGuard>> {
	if config.console {
		init_console_logging(&config.level, otel)?;
		return Ok(None);
	}
	match config.file.as_deref() {
		Some(file) => init_file_logging(&config.level, file, config.rotation_max_files, otel).map(Some),
		None => Err(anyhow::anyhow!("Logging file and console are both empty")),
	}
}

pub fn init_console_logging(level: &str, otel: Option<SdkTracer>) -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_new(level)?)
		.with(fmt::layer().with_writer(io::stdout).with_file(true).with_target(true).with_line_number(true).with_ansi(false))
		.with(otel.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
		.try_init()
		.map_err(|e| anyhow::anyhow!("Failed to init console logging: {}", e))?;

	info!("Console logging system initialized");
	Ok(())
}

pub fn init_file_logging(level: &str, file_path: &str, rotation_max_files: usize, otel: Option<SdkTracer>) -> anyhow::Result<WorkerGuard> {
	let path = Path::new(file_path);
	let parent = path.parent().ok_or_else(|| anyhow::anyhow!("Log file {} has no parent directory", file_path))?;
	if !parent.as_os_str().is_empty() {
		std::fs::create_dir_all(parent)?;
	}
	let file_name = path.file_name().and_then(|name| name.to_str()).ok_or_else(|| anyhow::anyhow!("Log file {} has no valid file name", file_path))?;
	let file_appender = RollingFileAppender::builder().rotation(Rotation::DAILY).max_log_files(rotation_max_files).filename_prefix(file_name).build(parent)?;
	let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
	tracing_subscriber::registry()
		.with(EnvFilter::try_new(level)?)
		.with(fmt::layer().with_writer(non_blocking).with_file(true).with_target(true).with_line_number(true).with_ansi(false))
		.with(otel.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
		.try_init()
		.map_err(|e| anyhow::anyhow!("Failed to init file logging: {}", e))?;

	info!("File logging system initialized");
	Ok(guard)
}
