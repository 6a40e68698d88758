//! broker rpc 路由、并发处理和 grpc 服务测试
//! 运行方式: cargo test --test rpc_tests

use {
	proto::translation_service_server::TranslationService,
	serde_json::{Value, json},
	std::{sync::Arc, time::Duration},
	tests::fakes::{EventLog, FakeWebApi, MemoryRepo, record},
	tokio::sync::oneshot,
	tonic::{Code, Request},
	translation::{
		grpc_server::{GrpcServer, TranslationGrpc},
		inflight::Inflight,
		rpc_router::{RpcRouter, RpcStatus},
		service::ManageableService,
		usecase::{Translation, TranslationUseCase},
	},
};

fn usecase(repo: MemoryRepo, web_api: FakeWebApi) -> Arc<dyn Translation> {
	Arc::new(TranslationUseCase::new(repo, web_api, None))
}

fn body(bytes: &[u8]) -> Value {
	serde_json::from_slice(bytes).unwrap()
}

// ============================================================================
// RpcRouter
// ============================================================================

#[tokio::test]
async fn test_rpc_get_history() {
	let router = RpcRouter::new(usecase(MemoryRepo::with_records(vec![record("cat", "猫")]), FakeWebApi::default()));
	let reply = router.dispatch("v1.getHistory", b"").await;

	assert_eq!(reply.status, RpcStatus::Success);
	assert_eq!(reply.status.as_str(), "success");
	assert_eq!(body(&reply.body)["history"][0]["translation"], "猫");
}

#[tokio::test]
async fn test_rpc_translate() {
	let repo = MemoryRepo::default();
	let router = RpcRouter::new(usecase(repo.clone(), FakeWebApi::default()));
	let payload = json!({"source": "en", "destination": "de", "original": "dog"}).to_string();
	let reply = router.dispatch("v1.translate", payload.as_bytes()).await;

	assert_eq!(reply.status, RpcStatus::Success);
	assert_eq!(body(&reply.body)["translation"], "DOG");
	assert_eq!(repo.records().len(), 1);
}

#[tokio::test]
async fn test_rpc_unknown_handler() {
	let router = RpcRouter::new(usecase(MemoryRepo::default(), FakeWebApi::default()));
	let reply = router.dispatch("v2.nothing", b"{}").await;

	assert_eq!(reply.status, RpcStatus::BadHandler);
	assert_eq!(reply.status.as_str(), "bad_handler");
	assert_eq!(body(&reply.body)["code"], "BAD_HANDLER");
}

#[tokio::test]
async fn test_rpc_bad_request() {
	let router = RpcRouter::new(usecase(MemoryRepo::default(), FakeWebApi::default()));

	let reply = router.dispatch("v1.translate", b"not json").await;
	assert_eq!(reply.status, RpcStatus::BadRequest);
	assert_eq!(reply.status.as_str(), "bad_request");

	let payload = json!({"source": "en", "destination": "de", "original": ""}).to_string();
	let reply = router.dispatch("v1.translate", payload.as_bytes()).await;
	assert_eq!(reply.status, RpcStatus::BadRequest);
	assert_eq!(body(&reply.body)["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_rpc_use_case_error() {
	let router = RpcRouter::new(usecase(MemoryRepo::default(), FakeWebApi { fail: true }));
	let payload = json!({"source": "en", "destination": "de", "original": "dog"}).to_string();
	let reply = router.dispatch("v1.translate", payload.as_bytes()).await;

	assert_eq!(reply.status, RpcStatus::Error);
	assert_eq!(reply.status.as_str(), "error");
	assert_eq!(body(&reply.body)["message"], "external service unavailable");
}

// ============================================================================
// gRPC
// ============================================================================

#[tokio::test]
async fn test_grpc_get_history_and_translate() {
	let repo = MemoryRepo::with_records(vec![record("one", "1")]);
	let service = TranslationGrpc::new(usecase(repo.clone(), FakeWebApi::default()));

	let response = service.get_history(Request::new(proto::GetHistoryRequest {})).await.unwrap().into_inner();
	assert_eq!(response.history.len(), 1);
	assert_eq!(response.history[0].original, "one");

	let request = proto::TranslateRequest { source: "en".to_string(), destination: "ja".to_string(), original: "two".to_string() };
	let response = service.translate(Request::new(request)).await.unwrap().into_inner();
	assert_eq!(response.translation.unwrap().translation, "TWO");
	assert_eq!(repo.records().len(), 2);
}

#[tokio::test]
async fn test_grpc_error_codes() {
	let service = TranslationGrpc::new(usecase(MemoryRepo::default(), FakeWebApi::default()));
	let request = proto::TranslateRequest { source: "en".to_string(), destination: "ja".to_string(), original: String::new() };
	let status = service.translate(Request::new(request)).await.unwrap_err();
	assert_eq!(status.code(), Code::InvalidArgument);

	let service = TranslationGrpc::new(usecase(MemoryRepo::default(), FakeWebApi { fail: true }));
	let request = proto::TranslateRequest { source: "en".to_string(), destination: "ja".to_string(), original: "x".to_string() };
	assert_eq!(service.translate(Request::new(request)).await.unwrap_err().code(), Code::Unavailable);

	let service = TranslationGrpc::new(usecase(MemoryRepo::failing_get(), FakeWebApi::default()));
	assert_eq!(service.get_history(Request::new(proto::GetHistoryRequest {})).await.unwrap_err().code(), Code::Internal);
}

#[tokio::test]
async fn test_grpc_server_lifecycle() {
	let mut server = GrpcServer::bind("127.0.0.1:0", usecase(MemoryRepo::default(), FakeWebApi::default())).await.unwrap();
	assert_ne!(server.local_addr().port(), 0);

	server.start();
	let mut notify = server.notify();
	assert!(tokio::time::timeout(std::time::Duration::from_millis(50), &mut notify).await.is_err());
	server.shutdown(std::time::Duration::from_secs(2)).await.unwrap();
}

#[tokio::test]
async fn test_unstarted_server_shutdown_releases_listener() {
	let mut server = GrpcServer::bind("127.0.0.1:0", usecase(MemoryRepo::default(), FakeWebApi::default())).await.unwrap();
	let addr = server.local_addr();
	server.shutdown(std::time::Duration::from_secs(1)).await.unwrap();

	// 端口已经释放 可以重新绑定
	assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
}

// ============================================================================
// 并发处理
// ============================================================================

#[tokio::test]
async fn test_slow_message_does_not_block_others() {
	let log = EventLog::default();
	let mut inflight = Inflight::new(4);

	let (slow_tx, slow_rx) = oneshot::channel::<()>();
	let permit = inflight.reserve().await.unwrap();
	let slow_log = log.clone();
	inflight.spawn(permit, async move {
		let _ = slow_rx.await;
		slow_log.push("done:slow");
	});

	let (fast_tx, fast_rx) = oneshot::channel::<()>();
	let permit = inflight.reserve().await.unwrap();
	let fast_log = log.clone();
	inflight.spawn(permit, async move {
		fast_log.push("done:fast");
		let _ = fast_tx.send(());
	});

	tokio::time::timeout(Duration::from_secs(1), fast_rx).await.unwrap().unwrap();
	assert_eq!(log.with_prefix("done"), vec!["fast"]);

	slow_tx.send(()).unwrap();
	inflight.drain().await;
	assert_eq!(log.with_prefix("done"), vec!["fast", "slow"]);
	assert_eq!(inflight.available(), 4);
}

#[tokio::test]
async fn test_inflight_limit_blocks_until_a_slot_frees() {
	let mut inflight = Inflight::new(1);
	let (tx, rx) = oneshot::channel::<()>();
	let permit = inflight.reserve().await.unwrap();
	inflight.spawn(permit, async move {
		let _ = rx.await;
	});
	assert_eq!(inflight.available(), 0);

	// 满了之后拿不到下一条消息的名额
	assert!(tokio::time::timeout(Duration::from_millis(50), inflight.reserve()).await.is_err());

	tx.send(()).unwrap();
	let permit = tokio::time::timeout(Duration::from_secs(1), inflight.reserve()).await.unwrap().unwrap();
	drop(permit);
	inflight.drain().await;
	assert_eq!(inflight.available(), 1);
}
