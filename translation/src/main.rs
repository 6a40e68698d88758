use {std::process::ExitCode, translation::{app, init}};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let (config, env) = init::init_load()?;
	let tracer = init::init_tracer(&config, &env)?;
	// 最后 drop 资源释放阶段的日志也能落盘
	let _log_guard = init::init_logging(&config, tracer.as_ref())?;

	let report = app::run(config, env, tracer).await?;

	// 服务自己出错退出时返回非 0 让进程管理器重启
	if report.trigger.is_service_exit() { Ok(ExitCode::FAILURE) } else { Ok(ExitCode::SUCCESS) }
}
