use {
	crate::{
		consts::{RPC_HANDLER_GET_HISTORY, RPC_HANDLER_TRANSLATE},
		entity::{AppError, TranslateRequest},
		usecase::Translation,
	},
	serde::Serialize,
	std::sync::Arc,
	tracing::{error, warn},
};

/// rpc 回复状态 amqp 放在 type 属性 nats 放在 header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStatus {
	Success,
	BadHandler,
	BadRequest,
	Error,
}

impl RpcStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RpcStatus::Success => "success",
			RpcStatus::BadHandler => "bad_handler",
			RpcStatus::BadRequest => "bad_request",
			RpcStatus::Error => "error",
		}
	}
}

#[derive(Debug, Clone, Serialize)]
struct RpcErrorBody<'a> {
	code: &'a str,
	message: String,
}

#[derive(Debug, Clone)]
pub struct RpcReply {
	pub status: RpcStatus,
	pub body: Vec<u8>,
}

impl RpcReply {
	fn ok<T: Serialize>(value: &T) -> Self {
		match serde_json::to_vec(value) {
			Ok(body) => Self { status: RpcStatus::Success, body },
			Err(e) => {
				error!("Failed to encode rpc reply: {}", e);
				Self::error(RpcStatus::Error, "INTERNAL_ERROR", "internal server error".to_string())
			}
		}
	}

	fn error(status: RpcStatus, code: &str, message: String) -> Self {
		// 结构固定 序列化不会失败
		let body = serde_json::to_vec(&RpcErrorBody { code, message }).unwrap_or_default();
		Self { status, body }
	}

	fn from_app_error(e: AppError) -> Self {
		let status = if matches!(e, AppError::Validation(_)) { RpcStatus::BadRequest } else { RpcStatus::Error };
		Self::error(status, e.code(), e.public_message())
	}
}

/// 消息中间件 rpc 的路由 amqp 和 nats 共用
/// handler 名称决定调用哪个用例 payload 是 json
#[derive(Clone)]
pub struct RpcRouter {
	usecase: Arc<dyn Translation>,
}

impl RpcRouter {
	pub fn new(usecase: Arc<dyn Translation>) -> Self {
		Self { usecase }
	}

	pub async fn dispatch(&self, handler: &str, payload: &[u8]) -> RpcReply {
		match handler {
			RPC_HANDLER_GET_HISTORY => match self.usecase.history().await {
				Ok(history) => RpcReply::ok(&history),
				Err(e) => {
					error!("rpc {} failed: {}", handler, e);
					RpcReply::from_app_error(e)
				}
			},
			RPC_HANDLER_TRANSLATE => {
				let request: TranslateRequest = match serde_json::from_slice(payload) {
					Ok(request) => request,
					Err(e) => return RpcReply::error(RpcStatus::BadRequest, "VALIDATION_ERROR", format!("invalid request body: {}", e)),
				};
				match self.usecase.translate(request).await {
					Ok(translation) => RpcReply::ok(&translation),
					Err(e) => {
						error!("rpc {} failed: {}", handler, e);
						RpcReply::from_app_error(e)
					}
				}
			}
			_ => {
				warn!("rpc unknown handler: {:?}", handler);
				RpcReply::error(RpcStatus::BadHandler, "BAD_HANDLER", format!("unknown handler: {}", handler))
			}
		}
	}
}
