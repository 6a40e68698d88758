//! http 路由和中间件测试 直接对 Router 调 oneshot 不占端口
//! 运行方式: cargo test --test http_router_tests

use {
	async_trait::async_trait,
	axum::{
		Router,
		body::{Body, to_bytes},
		extract::ConnectInfo,
		http::{Request, StatusCode, header::CONTENT_TYPE},
	},
	opentelemetry::trace::TracerProvider as _,
	opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider},
	serde_json::{Value, json},
	std::{net::SocketAddr, sync::Arc},
	tests::fakes::{FakeWebApi, MemoryRepo, record, test_config},
	tower::ServiceExt,
	tracing_subscriber::layer::SubscriberExt,
	translation::{
		config::RateLimitConfig,
		entity::{AppError, TranslateRequest, Translation as TranslationRecord, TranslationHistory},
		http_server::HttpServer,
		router,
		service::ManageableService,
		usecase::{Translation, TranslationUseCase},
	},
};

fn usecase(repo: MemoryRepo, web_api: FakeWebApi) -> Arc<dyn Translation> {
	Arc::new(TranslationUseCase::new(repo, web_api, None))
}

fn build_router(repo: MemoryRepo) -> Router {
	router::app(usecase(repo, FakeWebApi::default()), &test_config()).unwrap().0
}

async fn body_json(response: axum::response::Response) -> Value {
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

fn translate_request(body: &Value) -> Request<Body> {
	Request::builder().method("POST").uri("/v1/translation/do-translate").header(CONTENT_TYPE, "application/json").body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_healthz() {
	let response = build_router(MemoryRepo::default()).oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_history_route() {
	let repo = MemoryRepo::with_records(vec![record("hello", "你好")]);
	let response = build_router(repo).oneshot(Request::builder().uri("/v1/translation/history").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let body = body_json(response).await;
	assert_eq!(body, json!({"history": [{"source": "en", "destination": "zh", "original": "hello", "translation": "你好"}]}));
}

#[tokio::test]
async fn test_translate_route() {
	let repo = MemoryRepo::default();
	let response = build_router(repo.clone()).oneshot(translate_request(&json!({"source": "en", "destination": "fr", "original": "bonjour"}))).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let body = body_json(response).await;
	assert_eq!(body["translation"], "BONJOUR");
	assert_eq!(repo.records().len(), 1);
}

#[tokio::test]
async fn test_validation_error_body() {
	let response = build_router(MemoryRepo::default()).oneshot(translate_request(&json!({"source": "en", "destination": "fr", "original": ""}))).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let request_id = response.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
	let body = body_json(response).await;
	assert_eq!(body["code"], "VALIDATION_ERROR");
	assert_eq!(body["request_id"], request_id.as_str());
	assert!(body["message"].as_str().unwrap().contains("original"));
	assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
	let request = Request::builder().method("POST").uri("/v1/translation/do-translate").header(CONTENT_TYPE, "application/json").body(Body::from("{not json")).unwrap();
	let response = build_router(MemoryRepo::default()).oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_external_service_error_hides_cause() {
	let app = router::app(usecase(MemoryRepo::default(), FakeWebApi { fail: true }), &test_config()).unwrap().0;
	let response = app.oneshot(translate_request(&json!({"source": "en", "destination": "fr", "original": "hi"}))).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

	let body = body_json(response).await;
	assert_eq!(body["code"], "EXTERNAL_SERVICE_ERROR");
	assert_eq!(body["message"], "external service unavailable");
}

#[tokio::test]
async fn test_internal_error_status() {
	let response = build_router(MemoryRepo::failing_get()).oneshot(Request::builder().uri("/v1/translation/history").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(body_json(response).await["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_request_id_propagated_and_security_headers() {
	let request = Request::builder().uri("/v1/translation/history").header("x-request-id", "req-123").body(Body::empty()).unwrap();
	let response = build_router(MemoryRepo::default()).oneshot(request).await.unwrap();

	let headers = response.headers();
	assert_eq!(headers["x-request-id"], "req-123");
	assert_eq!(headers["x-content-type-options"], "nosniff");
	assert_eq!(headers["x-frame-options"], "DENY");
	assert_eq!(headers["x-xss-protection"], "0");
	assert_eq!(headers["referrer-policy"], "no-referrer");
}

fn from_peer(uri: &str, peer: &str) -> Request<Body> {
	let addr: SocketAddr = peer.parse().unwrap();
	Request::builder().uri(uri).extension(ConnectInfo(addr)).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_rate_limit_per_peer_address() {
	let mut config = test_config();
	config.rate_limit = RateLimitConfig { max: 2, interval_secs: 60 };
	let (app, limiter) = router::app(usecase(MemoryRepo::default(), FakeWebApi::default()), &config).unwrap();

	for _ in 0..2 {
		let response = app.clone().oneshot(from_peer("/v1/translation/history", "10.0.0.1:5000")).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
	}
	// 同一个 ip 换端口还是同一个桶
	let response = app.clone().oneshot(from_peer("/v1/translation/history", "10.0.0.1:6000")).await.unwrap();
	assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
	let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
	let body = body_json(response).await;
	assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");
	assert_eq!(body["request_id"], request_id.as_str());

	// 其他 ip 不受影响 healthz 不限流
	assert_eq!(app.clone().oneshot(from_peer("/v1/translation/history", "10.0.0.2:5000")).await.unwrap().status(), StatusCode::OK);
	assert_eq!(app.oneshot(from_peer("/healthz", "10.0.0.1:5000")).await.unwrap().status(), StatusCode::OK);
	assert_eq!(limiter.len(), 2);
}

#[tokio::test]
async fn test_spoofed_forwarding_headers_do_not_reset_bucket() {
	let mut config = test_config();
	config.rate_limit = RateLimitConfig { max: 1, interval_secs: 60 };
	let (app, limiter) = router::app(usecase(MemoryRepo::default(), FakeWebApi::default()), &config).unwrap();

	let spoofed = |fake_ip: &str| {
		let mut request = from_peer("/v1/translation/history", "10.0.0.1:5000");
		request.headers_mut().insert("x-real-ip", fake_ip.parse().unwrap());
		request.headers_mut().insert("x-forwarded-for", fake_ip.parse().unwrap());
		request
	};
	assert_eq!(app.clone().oneshot(spoofed("1.1.1.1")).await.unwrap().status(), StatusCode::OK);
	assert_eq!(app.clone().oneshot(spoofed("2.2.2.2")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(app.oneshot(spoofed("3.3.3.3")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(limiter.len(), 1);
}

#[tokio::test]
async fn test_trusted_proxy_uses_first_forwarded_hop() {
	let mut config = test_config();
	config.http.trust_proxy_headers = true;
	config.rate_limit = RateLimitConfig { max: 1, interval_secs: 60 };
	let (app, _limiter) = router::app(usecase(MemoryRepo::default(), FakeWebApi::default()), &config).unwrap();

	// 所有请求都来自同一个代理
	let request = |chain: &str| {
		let mut request = from_peer("/v1/translation/history", "192.168.0.1:5000");
		request.headers_mut().insert("x-forwarded-for", chain.parse().unwrap());
		request
	};
	assert_eq!(app.clone().oneshot(request("1.1.1.1, 10.0.0.1")).await.unwrap().status(), StatusCode::OK);
	assert_eq!(app.clone().oneshot(request("1.1.1.1, 10.0.0.2")).await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
	assert_eq!(app.clone().oneshot(request("2.2.2.2, 10.0.0.1")).await.unwrap().status(), StatusCode::OK);

	// X-Real-IP 优先
	let mut real_ip = request("2.2.2.2");
	real_ip.headers_mut().insert("x-real-ip", "3.3.3.3".parse().unwrap());
	assert_eq!(app.oneshot(real_ip).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
	let response = build_router(MemoryRepo::default()).oneshot(Request::builder().uri("/v2/nothing").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_server_lifecycle() {
	let mut config = test_config();
	config.http.port = 0;
	let mut server = HttpServer::bind(&config, usecase(MemoryRepo::default(), FakeWebApi::default())).await.unwrap();
	assert_ne!(server.local_addr().port(), 0);

	server.start();
	let mut notify = server.notify();
	let stream = tokio::net::TcpStream::connect(("127.0.0.1", server.local_addr().port())).await;
	assert!(stream.is_ok());
	drop(stream);

	// 运行期间 notify 不会完成
	assert!(tokio::time::timeout(std::time::Duration::from_millis(50), &mut notify).await.is_err());
	server.shutdown(std::time::Duration::from_secs(2)).await.unwrap();
}

// ============================================================================
// panic 恢复
// ============================================================================

struct PanickingUseCase;

#[async_trait]
impl Translation for PanickingUseCase {
	async fn history(&self) -> Result<TranslationHistory, AppError> {
		panic!("history exploded")
	}

	async fn translate(&self, _request: TranslateRequest) -> Result<TranslationRecord, AppError> {
		Err(AppError::NotFound)
	}
}

#[tokio::test]
async fn test_handler_panic_becomes_internal_error() {
	let app = router::app(Arc::new(PanickingUseCase), &test_config()).unwrap().0;
	let response = app.clone().oneshot(Request::builder().uri("/v1/translation/history").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(response.headers()["x-content-type-options"], "nosniff");

	let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
	let body = body_json(response).await;
	assert_eq!(body["code"], "INTERNAL_ERROR");
	assert_eq!(body["message"], "internal server error");
	assert_eq!(body["request_id"], request_id.as_str());

	// 路由还能继续服务
	let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// 指标
// ============================================================================

fn requests_total(rendered: &str, labels: &[&str]) -> u64 {
	rendered
		.lines()
		.filter(|line| line.starts_with("http_requests_total{") && labels.iter().all(|label| line.contains(label)))
		.filter_map(|line| line.rsplit(' ').next()?.parse::<f64>().ok())
		.map(|value| value as u64)
		.sum()
}

async fn scrape(app: &Router) -> String {
	let response = app.clone().oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap()
}

#[tokio::test]
async fn test_metrics_endpoint_counts_requests() {
	let mut config = test_config();
	config.metrics.enabled = true;
	let app = router::app(usecase(MemoryRepo::default(), FakeWebApi::default()), &config).unwrap().0;

	let history = ["method=\"GET\"", "path=\"/v1/translation/history\"", "status=\"200\""];
	let unmatched = ["path=\"unmatched\"", "status=\"404\""];
	let before = scrape(&app).await;

	for _ in 0..3 {
		app.clone().oneshot(Request::builder().uri("/v1/translation/history").body(Body::empty()).unwrap()).await.unwrap();
	}
	app.clone().oneshot(Request::builder().uri("/no/such/path").body(Body::empty()).unwrap()).await.unwrap();

	// 同一进程里的其他测试也可能在计数 只比较增量下限
	let after = scrape(&app).await;
	assert!(requests_total(&after, &history) >= requests_total(&before, &history) + 3);
	assert!(requests_total(&after, &unmatched) > requests_total(&before, &unmatched));
	assert!(after.contains("http_request_duration_seconds"));
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
	let response = build_router(MemoryRepo::default()).oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// 链路追踪
// ============================================================================

#[tokio::test]
async fn test_trace_id_header_continues_incoming_trace() {
	let provider = SdkTracerProvider::builder().with_simple_exporter(InMemorySpanExporter::default()).build();
	let subscriber = tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(provider.tracer("http-test")));
	let _guard = tracing::subscriber::set_default(subscriber);

	let mut config = test_config();
	config.tracer.enabled = true;
	let app = router::app(usecase(MemoryRepo::default(), FakeWebApi::default()), &config).unwrap().0;

	let traced = Request::builder().uri("/healthz").header("traceparent", "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01").body(Body::empty()).unwrap();
	let response = app.clone().oneshot(traced).await.unwrap();
	assert_eq!(response.headers()["x-trace-id"], "4bf92f3577b34da6a3ce929d0e0e4736");

	// 没有上游 trace 时开启新的 trace
	let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
	let trace_id = response.headers()["x-trace-id"].to_str().unwrap();
	assert_eq!(trace_id.len(), 32);
	assert_ne!(trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
}

#[tokio::test]
async fn test_no_trace_id_when_tracer_disabled() {
	let response = build_router(MemoryRepo::default()).oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
	assert!(response.headers().get("x-trace-id").is_none());
}
