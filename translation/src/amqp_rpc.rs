use {
	crate::{
		consts::RPC_MAX_INFLIGHT,
		inflight::Inflight,
		rpc_router::RpcRouter,
		service::{ManageableService, Notify, ServiceTask},
	},
	async_trait::async_trait,
	common::common_env::redact_url,
	futures::StreamExt,
	lapin::{
		BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
		message::Delivery,
		options::{BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
		types::{FieldTable, ShortString},
	},
	std::time::Duration,
	tracing::{error, info, warn},
};

const CONSUMER_TAG: &str = "translation-rpc-server";

/// amqp rpc 入口
/// 构造时建立连接并声明 fanout exchange 和同名队列 start 之后才开始消费
pub struct AmqpRpcServer {
	task: ServiceTask,
	pending: Option<(Connection, Channel)>,
	exchange: String,
	router: RpcRouter,
}

impl AmqpRpcServer {
	pub async fn connect(url: &str, exchange: &str, router: RpcRouter) -> anyhow::Result<Self> {
		let conn = Connection::connect(url, ConnectionProperties::default()).await.map_err(|e| anyhow::anyhow!("failed to connect amqp {}: {}", redact_url(url), e))?;
		let channel = conn.create_channel().await?;
		channel.exchange_declare(exchange, ExchangeKind::Fanout, ExchangeDeclareOptions::default(), FieldTable::default()).await?;
		channel.queue_declare(exchange, QueueDeclareOptions::default(), FieldTable::default()).await?;
		channel.queue_bind(exchange, exchange, "", QueueBindOptions::default(), FieldTable::default()).await?;
		info!("AMQP connected to {}, exchange {}", redact_url(url), exchange);
		Ok(Self { task: ServiceTask::new("amqp_rpc"), pending: Some((conn, channel)), exchange: exchange.to_string(), router })
	}
}

async fn handle_delivery(channel: &Channel, router: &RpcRouter, delivery: Delivery) -> anyhow::Result<()> {
	let props = &delivery.properties;
	let handler = props.kind().as_ref().map(|kind| kind.as_str().to_string()).unwrap_or_default();
	let reply = router.dispatch(&handler, &delivery.data).await;

	match props.reply_to().as_ref() {
		Some(reply_to) => {
			let mut reply_props = BasicProperties::default().with_kind(ShortString::from(reply.status.as_str())).with_content_type(ShortString::from("application/json"));
			if let Some(correlation_id) = props.correlation_id().as_ref() {
				reply_props = reply_props.with_correlation_id(correlation_id.clone());
			}
			channel.basic_publish("", reply_to.as_str(), BasicPublishOptions::default(), &reply.body, reply_props).await?.await?;
		}
		None => warn!("amqp rpc {} without reply_to, reply dropped", handler),
	}
	// 回复之后再 ack
	delivery.ack(BasicAckOptions::default()).await?;
	Ok(())
}

async fn consume_loop(conn: Connection, channel: Channel, exchange: String, router: RpcRouter, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) -> anyhow::Result<()> {
	let mut consumer = channel.basic_consume(&exchange, CONSUMER_TAG, BasicConsumeOptions::default(), FieldTable::default()).await?;
	info!("AMQP RPC server consuming queue {}", exchange);

	let mut inflight = Inflight::new(RPC_MAX_INFLIGHT);
	let result = loop {
		let permit = tokio::select! {
			_ = &mut shutdown_rx => break Ok(()),
			permit = inflight.reserve() => match permit {
				Ok(permit) => permit,
				Err(e) => break Err(e),
			},
		};
		tokio::select! {
			_ = &mut shutdown_rx => break Ok(()),
			delivery = consumer.next() => match delivery {
				Some(Ok(delivery)) => {
					let (channel, router) = (channel.clone(), router.clone());
					inflight.spawn(permit, async move {
						if let Err(e) = handle_delivery(&channel, &router, delivery).await {
							error!("amqp rpc failed to handle delivery: {:#}", e);
						}
					});
				}
				Some(Err(e)) => break Err(anyhow::anyhow!("amqp consumer error: {}", e)),
				None => break Err(anyhow::anyhow!("amqp consumer stream closed")),
			},
		}
	};

	if result.is_ok() {
		if let Err(e) = channel.basic_cancel(CONSUMER_TAG, BasicCancelOptions::default()).await {
			warn!("amqp basic_cancel failed: {}", e);
		}
	}
	// 在处理的消息回复并 ack 之后再关 channel
	inflight.drain().await;
	if let Err(e) = channel.close(200, "shutdown").await {
		warn!("amqp channel close failed: {}", e);
	}
	if let Err(e) = conn.close(200, "shutdown").await {
		warn!("amqp connection close failed: {}", e);
	}
	info!("AMQP RPC server stopped");
	result
}

#[async_trait]
impl ManageableService for AmqpRpcServer {
	fn start(&mut self) {
		let Some((conn, channel)) = self.pending.take() else {
			return;
		};
		let exchange = self.exchange.clone();
		let router = self.router.clone();
		self.task.spawn(move |shutdown_rx| consume_loop(conn, channel, exchange, router, shutdown_rx));
	}

	fn notify(&mut self) -> Notify {
		self.task.notify()
	}

	async fn shutdown(&mut self, deadline: Duration) -> anyhow::Result<()> {
		// 未启动 连接还在这里
		if let Some((conn, _channel)) = self.pending.take() {
			conn.close(200, "shutdown").await?;
			return Ok(());
		}
		self.task.stop(deadline).await
	}
}
