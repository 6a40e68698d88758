use {
	crate::{
		consts::{NATS_TYPE_HEADER, RPC_MAX_INFLIGHT},
		inflight::Inflight,
		rpc_router::RpcRouter,
		service::{ManageableService, Notify, ServiceTask},
	},
	async_nats::{Client, HeaderMap, Message},
	async_trait::async_trait,
	common::common_env::redact_url,
	futures::StreamExt,
	std::time::Duration,
	tokio::sync::oneshot,
	tracing::{error, info, warn},
};

/// nats rpc 入口 构造时连接 start 之后才订阅
pub struct NatsRpcServer {
	task: ServiceTask,
	client: Client,
	subject: String,
	router: RpcRouter,
}

impl NatsRpcServer {
	pub async fn connect(url: &str, subject: &str, router: RpcRouter) -> anyhow::Result<Self> {
		let client = async_nats::connect(url).await.map_err(|e| anyhow::anyhow!("failed to connect nats {}: {}", redact_url(url), e))?;
		info!("NATS connected to {}, subject {}", redact_url(url), subject);
		Ok(Self { task: ServiceTask::new("nats_rpc"), client, subject: subject.to_string(), router })
	}
}

async fn handle_message(client: &Client, router: &RpcRouter, message: Message) -> anyhow::Result<()> {
	let handler = message.headers.as_ref().and_then(|headers| headers.get(NATS_TYPE_HEADER)).map(|value| value.as_str().to_string()).unwrap_or_default();
	let reply = router.dispatch(&handler, &message.payload).await;

	let Some(reply_to) = message.reply else {
		warn!("nats rpc {} without reply subject, reply dropped", handler);
		return Ok(());
	};
	let mut headers = HeaderMap::new();
	headers.insert(NATS_TYPE_HEADER, reply.status.as_str());
	client.publish_with_headers(reply_to, headers, reply.body.into()).await?;
	Ok(())
}

async fn subscribe_loop(client: Client, subject: String, router: RpcRouter, mut shutdown_rx: oneshot::Receiver<()>) -> anyhow::Result<()> {
	let mut subscriber = client.subscribe(subject.clone()).await?;
	info!("NATS RPC server subscribed to {}", subject);

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
			message = subscriber.next() => match message {
				Some(message) => {
					let (client, router) = (client.clone(), router.clone());
					inflight.spawn(permit, async move {
						if let Err(e) = handle_message(&client, &router, message).await {
							error!("nats rpc failed to handle message: {:#}", e);
						}
					});
				}
				None => break Err(anyhow::anyhow!("nats subscription {} closed", subject)),
			},
		}
	};

	if let Err(e) = subscriber.unsubscribe().await {
		warn!("nats unsubscribe failed: {}", e);
	}
	inflight.drain().await;
	if let Err(e) = client.flush().await {
		warn!("nats flush failed: {}", e);
	}
	info!("NATS RPC server stopped");
	result
}

#[async_trait]
impl ManageableService for NatsRpcServer {
	fn start(&mut self) {
		let client = self.client.clone();
		let subject = self.subject.clone();
		let router = self.router.clone();
		self.task.spawn(move |shutdown_rx| subscribe_loop(client, subject, router, shutdown_rx));
	}

	fn notify(&mut self) -> Notify {
		self.task.notify()
	}

	async fn shutdown(&mut self, deadline: Duration) -> anyhow::Result<()> {
		let result = self.task.stop(deadline).await;
		if let Err(e) = self.client.flush().await {
			warn!("nats flush failed: {}", e);
		}
		result
	}
}
