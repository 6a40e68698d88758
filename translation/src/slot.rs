use {
	crate::service::{ManageableService, Notify, silent_notify},
	async_trait::async_trait,
	std::{fmt, time::Duration},
	tracing::info,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
	AmqpRpc,
	NatsRpc,
	Grpc,
	Http,
}

impl TransportKind {
	pub fn name(&self) -> &'static str {
		match self {
			TransportKind::AmqpRpc => "amqp_rpc",
			TransportKind::NatsRpc => "nats_rpc",
			TransportKind::Grpc => "grpc",
			TransportKind::Http => "http",
		}
	}
}

impl fmt::Display for TransportKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// 构造顺序
pub const CONSTRUCT_ORDER: [TransportKind; 4] = [TransportKind::AmqpRpc, TransportKind::NatsRpc, TransportKind::Grpc, TransportKind::Http];

/// 启动顺序 先起后端消费者 最后起 http 这样 healthz 可访问时其他入口都已经就绪
pub const START_ORDER: [TransportKind; 4] = [TransportKind::AmqpRpc, TransportKind::NatsRpc, TransportKind::Grpc, TransportKind::Http];

/// 停机顺序 先关对外的 http 再关 grpc 最后关消息中间件 rpc
pub const SHUTDOWN_ORDER: [TransportKind; 4] = [TransportKind::Http, TransportKind::Grpc, TransportKind::AmqpRpc, TransportKind::NatsRpc];

/// 一个可能存在的 transport
/// Disabled 的信号源永不完成 start/shutdown 都是空操作
pub enum ServiceSlot {
	Enabled { kind: TransportKind, service: Box<dyn ManageableService> },
	Disabled(TransportKind),
}

impl ServiceSlot {
	pub fn enabled(kind: TransportKind, service: Box<dyn ManageableService>) -> Self {
		ServiceSlot::Enabled { kind, service }
	}

	pub fn kind(&self) -> TransportKind {
		match self {
			ServiceSlot::Enabled { kind, .. } | ServiceSlot::Disabled(kind) => *kind,
		}
	}

	pub fn is_enabled(&self) -> bool {
		matches!(self, ServiceSlot::Enabled { .. })
	}

	/// 返回 false 表示未启用
	pub fn start(&mut self) -> bool {
		match self {
			ServiceSlot::Enabled { service, .. } => {
				service.start();
				true
			}
			ServiceSlot::Disabled(_) => false,
		}
	}

	pub fn notify(&mut self) -> Notify {
		match self {
			ServiceSlot::Enabled { service, .. } => service.notify(),
			ServiceSlot::Disabled(_) => silent_notify(),
		}
	}

	/// 未启用返回 None
	pub async fn shutdown(&mut self, deadline: Duration) -> Option<anyhow::Result<()>> {
		match self {
			ServiceSlot::Enabled { service, .. } => Some(service.shutdown(deadline).await),
			ServiceSlot::Disabled(_) => None,
		}
	}
}

/// 每种 transport 是否启用 http 是主入口 配置里始终为 true
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFlags {
	pub amqp_rpc: bool,
	pub nats_rpc: bool,
	pub grpc: bool,
	pub http: bool,
}

impl TransportFlags {
	pub fn is_enabled(&self, kind: TransportKind) -> bool {
		match kind {
			TransportKind::AmqpRpc => self.amqp_rpc,
			TransportKind::NatsRpc => self.nats_rpc,
			TransportKind::Grpc => self.grpc,
			TransportKind::Http => self.http,
		}
	}
}

/// 按种类构造具体服务 构造阶段可以绑定端口/连接 broker 但不能开始接收请求
#[async_trait]
pub trait TransportFactory: Send + Sync {
	async fn build(&self, kind: TransportKind) -> anyhow::Result<Box<dyn ManageableService>>;
}

/// 固定的四个 slot 进入运行阶段后不再增减
pub struct Slots {
	pub amqp_rpc: ServiceSlot,
	pub nats_rpc: ServiceSlot,
	pub grpc: ServiceSlot,
	pub http: ServiceSlot,
}

impl Default for Slots {
	fn default() -> Self {
		Self {
			amqp_rpc: ServiceSlot::Disabled(TransportKind::AmqpRpc),
			nats_rpc: ServiceSlot::Disabled(TransportKind::NatsRpc),
			grpc: ServiceSlot::Disabled(TransportKind::Grpc),
			http: ServiceSlot::Disabled(TransportKind::Http),
		}
	}
}

impl Slots {
	pub fn get_mut(&mut self, kind: TransportKind) -> &mut ServiceSlot {
		match kind {
			TransportKind::AmqpRpc => &mut self.amqp_rpc,
			TransportKind::NatsRpc => &mut self.nats_rpc,
			TransportKind::Grpc => &mut self.grpc,
			TransportKind::Http => &mut self.http,
		}
	}

	pub fn get(&self, kind: TransportKind) -> &ServiceSlot {
		match kind {
			TransportKind::AmqpRpc => &self.amqp_rpc,
			TransportKind::NatsRpc => &self.nats_rpc,
			TransportKind::Grpc => &self.grpc,
			TransportKind::Http => &self.http,
		}
	}

	/// 放入一个已构造的服务 测试和手动组装用
	pub fn with(mut self, kind: TransportKind, service: Box<dyn ManageableService>) -> Self {
		*self.get_mut(kind) = ServiceSlot::enabled(kind, service);
		self
	}

	pub fn enabled_kinds(&self) -> Vec<TransportKind> {
		CONSTRUCT_ORDER.into_iter().filter(|kind| self.get(*kind).is_enabled()).collect()
	}
}

/// 按 CONSTRUCT_ORDER 构造所有启用的服务
/// 任何一个失败立即返回错误 已构造的服务随 Slots 一起 drop 掉
pub async fn construct_slots(flags: &TransportFlags, factory: &dyn TransportFactory) -> anyhow::Result<Slots> {
	let mut slots = Slots::default();
	for kind in CONSTRUCT_ORDER {
		if !flags.is_enabled(kind) {
			info!("{} disabled", kind);
			continue;
		}
		let service = factory.build(kind).await.map_err(|e| e.context(format!("failed to construct {}", kind)))?;
		info!("{} constructed", kind);
		*slots.get_mut(kind) = ServiceSlot::enabled(kind, service);
	}
	Ok(slots)
}
