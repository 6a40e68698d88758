//! 服务编排 启动 -> 等待第一个信号 -> 按顺序停机
//!
//! 状态机 Constructing -> Starting -> Running -> ShuttingDown -> Exited
//! Constructing 阶段在 slot::construct_slots 里完成 构造失败直接 Exited

use {
	crate::{
		service::ServiceExit,
		slot::{SHUTDOWN_ORDER, START_ORDER, Slots, TransportKind},
	},
	std::{fmt, future::Future, time::Duration},
	thiserror::Error,
	tracing::{error, info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Constructing,
	Starting,
	Running,
	ShuttingDown,
	Exited,
}

/// 唤醒编排器的那个信号
#[derive(Debug)]
pub enum Trigger {
	Signal(String),
	Service { kind: TransportKind, exit: ServiceExit },
}

impl Trigger {
	/// 服务自己出错或退出 而不是收到系统信号
	pub fn is_service_exit(&self) -> bool {
		matches!(self, Trigger::Service { .. })
	}
}

impl fmt::Display for Trigger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Trigger::Signal(name) => write!(f, "signal {}", name),
			Trigger::Service { kind, exit: ServiceExit::Failed(e) } => write!(f, "{} failed: {:#}", kind, e),
			Trigger::Service { kind, exit: ServiceExit::Terminated } => write!(f, "{} terminated", kind),
		}
	}
}

#[derive(Debug, Error)]
pub enum ShutdownError {
	#[error("shutdown timed out after {0:?}")]
	Timeout(Duration),
	#[error("shutdown failed: {0:#}")]
	Failed(anyhow::Error),
}

#[derive(Debug)]
pub struct ShutdownRecord {
	pub kind: TransportKind,
	pub result: Result<(), ShutdownError>,
}

/// 每个已构造服务一条记录 顺序即停机顺序 只用于诊断
#[derive(Debug, Default)]
pub struct ShutdownOutcome {
	pub records: Vec<ShutdownRecord>,
}

impl ShutdownOutcome {
	pub fn is_clean(&self) -> bool {
		self.records.iter().all(|record| record.result.is_ok())
	}

	pub fn kinds(&self) -> Vec<TransportKind> {
		self.records.iter().map(|record| record.kind).collect()
	}

	pub fn failures(&self) -> impl Iterator<Item = &ShutdownRecord> {
		self.records.iter().filter(|record| record.result.is_err())
	}
}

#[derive(Debug)]
pub struct RunReport {
	pub trigger: Trigger,
	pub outcome: ShutdownOutcome,
}

pub struct Supervisor {
	slots: Slots,
	phase: Phase,
	shutdown_timeout: Duration,
}

impl Supervisor {
	/// 接收构造完成的 slots 进入 Starting
	pub fn new(slots: Slots, shutdown_timeout: Duration) -> Self {
		let mut supervisor = Self { slots, phase: Phase::Constructing, shutdown_timeout };
		supervisor.transition(Phase::Starting);
		supervisor
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	fn transition(&mut self, next: Phase) {
		info!("Lifecycle {:?} -> {:?}", self.phase, next);
		self.phase = next;
	}

	/// 完整流程 启动 等待 停机
	pub async fn run<S>(mut self, os_signal: S) -> RunReport
	where
		S: Future<Output = String>,
	{
		self.start_all();
		let trigger = self.wait_any(os_signal).await;
		let outcome = self.shutdown_all().await;
		RunReport { trigger, outcome }
	}

	/// 按 START_ORDER 启动所有已构造服务 返回启动的种类
	pub fn start_all(&mut self) -> Vec<TransportKind> {
		let mut started = Vec::new();
		if self.phase != Phase::Starting {
			warn!("start_all called in phase {:?}, ignored", self.phase);
			return started;
		}
		for kind in START_ORDER {
			if self.slots.get_mut(kind).start() {
				info!("{} started", kind);
				started.push(kind);
			}
		}
		self.transition(Phase::Running);
		started
	}

	/// 阻塞直到系统信号或任意已启用服务的信号到来 只会选出一个
	/// 未启用的 slot 贡献的是永不完成的信号源
	pub async fn wait_any<S>(&mut self, os_signal: S) -> Trigger
	where
		S: Future<Output = String>,
	{
		let amqp_rpc = self.slots.amqp_rpc.notify();
		let nats_rpc = self.slots.nats_rpc.notify();
		let grpc = self.slots.grpc.notify();
		let http = self.slots.http.notify();

		let trigger = tokio::select! {
			name = os_signal => Trigger::Signal(name),
			exit = http => Trigger::Service { kind: TransportKind::Http, exit },
			exit = grpc => Trigger::Service { kind: TransportKind::Grpc, exit },
			exit = amqp_rpc => Trigger::Service { kind: TransportKind::AmqpRpc, exit },
			exit = nats_rpc => Trigger::Service { kind: TransportKind::NatsRpc, exit },
		};

		match &trigger {
			Trigger::Signal(_) => info!("Shutdown triggered by {}", trigger),
			Trigger::Service { .. } => error!("Shutdown triggered by {}", trigger),
		}
		self.transition(Phase::ShuttingDown);
		trigger
	}

	/// 按 SHUTDOWN_ORDER 停掉每个已构造服务 每个服务单独计时
	/// 某个服务失败或超时不影响后面的服务 消耗 self 保证只执行一次
	pub async fn shutdown_all(mut self) -> ShutdownOutcome {
		if self.phase != Phase::ShuttingDown {
			self.transition(Phase::ShuttingDown);
		}
		let deadline = self.shutdown_timeout;
		let mut outcome = ShutdownOutcome::default();

		for kind in SHUTDOWN_ORDER {
			let slot = self.slots.get_mut(kind);
			if !slot.is_enabled() {
				continue;
			}
			let result = match tokio::time::timeout(deadline, slot.shutdown(deadline)).await {
				Ok(Some(Ok(()))) | Ok(None) => Ok(()),
				Ok(Some(Err(e))) => Err(ShutdownError::Failed(e)),
				Err(_) => Err(ShutdownError::Timeout(deadline)),
			};
			match &result {
				Ok(()) => info!("{} shut down", kind),
				Err(e) => error!("{} {}", kind, e),
			}
			outcome.records.push(ShutdownRecord { kind, result });
		}

		let failed = outcome.failures().count();
		if failed == 0 {
			info!("Shutdown pass completed, {} services stopped cleanly", outcome.records.len());
		} else {
			warn!("Shutdown pass completed, {} of {} services failed to stop cleanly", failed, outcome.records.len());
		}
		self.transition(Phase::Exited);
		outcome
	}
}
