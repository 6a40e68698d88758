use {
	config::{Config, Environment},
	serde::{Deserialize, Serialize},
	std::path::Path,
};

/// 进程级环境变量（连接串、密码等不进 toml 的配置）
#[derive(Clone, Deserialize, Serialize)]
pub struct CommonEnv {
	pub run_mode: String,

	// PostgreSQL
	pub postgres_host: String,
	pub postgres_port: u16,
	pub postgres_user: String,
	pub postgres_password: String,
	pub postgres_database: String,

	// Cache Redis
	#[serde(default)]
	pub redis_host: String,
	pub redis_password: Option<String>,
	#[serde(default)]
	pub redis_db: u32,

	// 消息中间件，只有对应 transport 启用时才要求非空
	#[serde(default)]
	pub amqp_url: String,
	#[serde(default)]
	pub nats_url: String,
}

// 手写 Debug 避免密码进日志
impl std::fmt::Debug for CommonEnv {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CommonEnv")
			.field("run_mode", &self.run_mode)
			.field("postgres_host", &self.postgres_host)
			.field("postgres_port", &self.postgres_port)
			.field("postgres_user", &self.postgres_user)
			.field("postgres_database", &self.postgres_database)
			.field("redis_host", &self.redis_host)
			.field("redis_db", &self.redis_db)
			.field("amqp_url", &redact_url(&self.amqp_url))
			.field("nats_url", &redact_url(&self.nats_url))
			.finish()
	}
}

/// 去掉 url 里的 userinfo 部分
pub fn redact_url(url: &str) -> String {
	match (url.find("://"), url.rfind('@')) {
		(Some(scheme_end), Some(at)) if at > scheme_end => format!("{}://***@{}", &url[..scheme_end], &url[at + 1..]),
		_ => url.to_string(),
	}
}

/// 加载 env 文件到进程环境变量，再从环境变量反序列化出 CommonEnv
/// 文件不存在时直接使用进程已有的环境变量（容器部署）
pub fn load_common_env(env_path: &str) -> anyhow::Result<CommonEnv> {
	if Path::new(env_path).exists() {
		dotenvy::from_path(env_path)?;
	} else {
		println!("Env file {} not found, using process environment", env_path);
	}

	let config = Config::builder().add_source(Environment::default().try_parsing(true)).build()?;
	let common_env: CommonEnv = config.try_deserialize()?;
	println!("Common env configuration: {:?}", common_env);
	check_common_env(&common_env)?;
	Ok(common_env)
}

pub fn check_common_env(common_env: &CommonEnv) -> anyhow::Result<()> {
	crate::consts::validate_run_mode(&common_env.run_mode)?;

	if common_env.postgres_host.is_empty() {
		return Err(anyhow::anyhow!("PostgreSQL host is empty"));
	}
	if common_env.postgres_port == 0 {
		return Err(anyhow::anyhow!("PostgreSQL port must be greater than 0"));
	}
	if common_env.postgres_user.is_empty() {
		return Err(anyhow::anyhow!("PostgreSQL user is empty"));
	}
	if common_env.postgres_database.is_empty() {
		return Err(anyhow::anyhow!("PostgreSQL database is empty"));
	}
	Ok(())
}
