//! 进程组装 资源 -> 用例 -> transport -> 编排器

use {
	crate::{
		amqp_rpc::AmqpRpcServer,
		cache::{HistoryCache, RedisHistoryCache},
		config::AppConfig,
		db::{PostgresTranslationRepo, init_db_pool},
		grpc_server::GrpcServer,
		http_server::HttpServer,
		nats_rpc::NatsRpcServer,
		orchestrator::{RunReport, Supervisor},
		resources::ResourceScope,
		rpc_router::RpcRouter,
		service::ManageableService,
		slot::{TransportFactory, TransportKind, construct_slots},
		usecase::{Translation, TranslationUseCase},
		webapi::GoogleTranslateWebApi,
	},
	async_trait::async_trait,
	common::{common_env::CommonEnv, graceful::wait_for_signal, redis_pool::init_redis_pool, tracer::OtlpTracer},
	std::sync::Arc,
	tracing::info,
};

/// 真正连接端口和 broker 的 transport 工厂
pub struct LiveTransports {
	config: AppConfig,
	env: CommonEnv,
	usecase: Arc<dyn Translation>,
}

impl LiveTransports {
	pub fn new(config: AppConfig, env: CommonEnv, usecase: Arc<dyn Translation>) -> Self {
		Self { config, env, usecase }
	}
}

#[async_trait]
impl TransportFactory for LiveTransports {
	async fn build(&self, kind: TransportKind) -> anyhow::Result<Box<dyn ManageableService>> {
		let service: Box<dyn ManageableService> = match kind {
			TransportKind::AmqpRpc => Box::new(AmqpRpcServer::connect(&self.env.amqp_url, &self.config.amqp.server_exchange, RpcRouter::new(self.usecase.clone())).await?),
			TransportKind::NatsRpc => Box::new(NatsRpcServer::connect(&self.env.nats_url, &self.config.nats.server_subject, RpcRouter::new(self.usecase.clone())).await?),
			TransportKind::Grpc => Box::new(GrpcServer::bind(&self.config.grpc.get_addr(), self.usecase.clone()).await?),
			TransportKind::Http => Box::new(HttpServer::bind(&self.config, self.usecase.clone()).await?),
		};
		Ok(service)
	}
}

/// 登记 span 导出器 必须在 redis、postgres 之前登记 这样最后释放
pub fn register_tracer(scope: &ResourceScope, tracer: OtlpTracer) {
	scope.register("tracer", move || tracer.shutdown());
}

/// 获取资源并运行编排器 返回时所有资源已经按逆序释放
pub async fn run(config: AppConfig, env: CommonEnv, tracer: Option<OtlpTracer>) -> anyhow::Result<RunReport> {
	let scope = ResourceScope::new(config.shutdown.timeout());
	match tracer {
		Some(tracer) => register_tracer(&scope, tracer),
		None => info!("OpenTelemetry tracer disabled"),
	}
	scope.guard(serve(&scope, config, env)).await
}

async fn serve(scope: &ResourceScope, config: AppConfig, env: CommonEnv) -> anyhow::Result<RunReport> {
	let cache: Option<Arc<dyn HistoryCache>> = if config.redis.enabled {
		let pool = init_redis_pool(&env.redis_host, env.redis_password.as_deref(), env.redis_db).await?;
		info!("Redis pool initialized (host: {}, db: {})", env.redis_host, env.redis_db);
		let release = pool.clone();
		scope.register("redis", move || async move {
			release.close();
			Ok(())
		});
		Some(Arc::new(RedisHistoryCache::new(pool, config.redis.history_ttl_secs)))
	} else {
		None
	};

	let pg = init_db_pool(&env, &config.postgres).await?;
	info!("Postgres pool initialized (host: {}, database: {})", env.postgres_host, env.postgres_database);
	let release = pg.clone();
	scope.register("postgres", move || async move {
		release.close().await;
		Ok(())
	});

	let usecase: Arc<dyn Translation> = Arc::new(TranslationUseCase::new(PostgresTranslationRepo::new(pg), GoogleTranslateWebApi::new()?, cache));

	let flags = config.transport_flags();
	let shutdown_timeout = config.shutdown.timeout();
	let factory = LiveTransports::new(config, env, usecase);
	let slots = construct_slots(&flags, &factory).await?;
	info!("Transports constructed: {:?}", slots.enabled_kinds());

	let report = Supervisor::new(slots, shutdown_timeout).run(wait_for_signal()).await;
	info!("Exiting after {}", report.trigger);
	Ok(report)
}
