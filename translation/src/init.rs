use {
	crate::config::{AppConfig, load_config},
	common::{
		common_env::{self, CommonEnv},
		consts::{COMMON_ENV_PATH, TRANSLATION_CONFIG_PATH},
		tracer::OtlpTracer,
	},
	tracing_appender::non_blocking::WorkerGuard,
};

/// 读取 env 和 toml 配置 任何错误都在构造 transport 之前返回
pub fn init_load() -> anyhow::Result<(AppConfig, CommonEnv)> {
	let env = common_env::load_common_env(COMMON_ENV_PATH)?;
	let config = load_config(TRANSLATION_CONFIG_PATH, &env.run_mode)?;
	config.check_env(&env)?;
	Ok((config, env))
}

/// 未启用时返回 None 启用后由 app::run 登记为第一个资源
pub fn init_tracer(config: &AppConfig, env: &CommonEnv) -> anyhow::Result<Option<OtlpTracer>> {
	if !config.tracer.enabled {
		return Ok(None);
	}
	OtlpTracer::init(&config.tracer, &config.app.version, &env.run_mode).map(Some)
}

/// 文件日志时返回 guard 由 main 持有到进程退出
pub fn init_logging(config: &AppConfig, tracer: Option<&OtlpTracer>) -> anyhow::Result<Option<WorkerGuard>> {
	common::logging::init_logging(&config.logging, tracer.map(OtlpTracer::tracer))
}
