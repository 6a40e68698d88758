use {
	crate::{
		entity::{AppError, TranslateRequest, Translation as TranslationEntity},
		service::{ManageableService, Notify, ServiceTask},
		usecase::Translation,
	},
	async_trait::async_trait,
	proto::{
		GetHistoryRequest, GetHistoryResponse, TranslationRecord,
		translation_service_server::{TranslationService, TranslationServiceServer},
	},
	std::{net::SocketAddr, sync::Arc, time::Duration},
	tokio::net::TcpListener,
	tokio_stream::wrappers::TcpListenerStream,
	tonic::{Request, Response, Status, transport::Server},
	tracing::{error, info},
};

fn to_status(e: AppError) -> Status {
	match &e {
		AppError::Validation(msg) => Status::invalid_argument(msg.clone()),
		AppError::NotFound => Status::not_found(e.public_message()),
		AppError::ExternalService(_) => {
			error!("grpc: {}", e);
			Status::unavailable(e.public_message())
		}
		AppError::Internal(_) => {
			error!("grpc: {}", e);
			Status::internal(e.public_message())
		}
	}
}

fn to_record(t: TranslationEntity) -> TranslationRecord {
	TranslationRecord { source: t.source, destination: t.destination, original: t.original, translation: t.translation }
}

pub struct TranslationGrpc {
	usecase: Arc<dyn Translation>,
}

impl TranslationGrpc {
	pub fn new(usecase: Arc<dyn Translation>) -> Self {
		Self { usecase }
	}
}

#[tonic::async_trait]
impl TranslationService for TranslationGrpc {
	async fn get_history(&self, _request: Request<GetHistoryRequest>) -> Result<Response<GetHistoryResponse>, Status> {
		let history = self.usecase.history().await.map_err(to_status)?;
		Ok(Response::new(GetHistoryResponse { history: history.history.into_iter().map(to_record).collect() }))
	}

	async fn translate(&self, request: Request<proto::TranslateRequest>) -> Result<Response<proto::TranslateResponse>, Status> {
		let req = request.into_inner();
		let translation = self.usecase.translate(TranslateRequest { source: req.source, destination: req.destination, original: req.original }).await.map_err(to_status)?;
		Ok(Response::new(proto::TranslateResponse { translation: Some(to_record(translation)) }))
	}
}

/// grpc 入口 构造时绑定端口
pub struct GrpcServer {
	task: ServiceTask,
	pending: Option<(TcpListener, TranslationGrpc)>,
	local_addr: SocketAddr,
}

impl GrpcServer {
	pub async fn bind(addr: &str, usecase: Arc<dyn Translation>) -> anyhow::Result<Self> {
		let listener = TcpListener::bind(addr).await.map_err(|e| anyhow::anyhow!("failed to bind grpc listener {}: {}", addr, e))?;
		let local_addr = listener.local_addr()?;
		Ok(Self { task: ServiceTask::new("grpc"), pending: Some((listener, TranslationGrpc::new(usecase))), local_addr })
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}
}

#[async_trait]
impl ManageableService for GrpcServer {
	fn start(&mut self) {
		let Some((listener, service)) = self.pending.take() else {
			return;
		};
		let local_addr = self.local_addr;
		self.task.spawn(move |shutdown_rx| async move {
			info!("gRPC server is running at {}", local_addr);
			let served = Server::builder()
				.add_service(TranslationServiceServer::new(service))
				.serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
					shutdown_rx.await.ok();
				})
				.await;
			info!("gRPC server stopped");
			served.map_err(|e| anyhow::anyhow!("grpc server error: {}", e))
		});
	}

	fn notify(&mut self) -> Notify {
		self.task.notify()
	}

	async fn shutdown(&mut self, deadline: Duration) -> anyhow::Result<()> {
		self.pending = None;
		self.task.stop(deadline).await
	}
}
