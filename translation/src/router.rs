use {
	crate::{
		config::{AppConfig, CorsConfig},
		consts::{HEALTHZ_PATH, METRICS_PATH, REQUEST_ID_HEADER, TRACE_ID_HEADER},
		entity::{AppError, TranslateRequest, Translation as TranslationRecord, TranslationHistory},
		usecase::Translation,
	},
	axum::{
		Json, Router,
		extract::{ConnectInfo, Extension, Request, State, rejection::JsonRejection},
		http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
		middleware::{self, Next},
		response::{IntoResponse, Response},
		routing::{get, post},
	},
	chrono::{SecondsFormat, Utc},
	common::{metrics, rate_limit::RateLimiter},
	opentelemetry::{
		propagation::{Extractor, TextMapPropagator},
		trace::TraceContextExt,
	},
	opentelemetry_sdk::propagation::TraceContextPropagator,
	serde::Serialize,
	std::{any::Any as PanicPayload, net::SocketAddr, sync::Arc, time::Instant},
	tower_http::{
		catch_panic::CatchPanicLayer,
		cors::{AllowOrigin, Any, CorsLayer},
		request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
		set_header::SetResponseHeaderLayer,
	},
	tracing::{Instrument, error, info, info_span, warn},
	tracing_opentelemetry::OpenTelemetrySpanExt,
	uuid::Uuid,
};

#[derive(Clone)]
pub struct RouterState {
	usecase: Arc<dyn Translation>,
	rate_limiter: Arc<RateLimiter>,
	trust_proxy_headers: bool,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
	pub request_id: String,
	pub ip: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	request_id: String,
	code: String,
	message: String,
	timestamp: String,
}

impl ErrorBody {
	fn new(request_id: String, code: &str, message: String) -> Self {
		Self { request_id, code: code.to_string(), message, timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }
	}
}

/// 带请求 id 的业务错误 内部原因只打日志
pub struct ApiError {
	pub request_id: String,
	pub error: AppError,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = StatusCode::from_u16(self.error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		if status.is_server_error() {
			error!("request_id={} - {}", self.request_id, self.error);
		} else {
			warn!("request_id={} - {}", self.request_id, self.error);
		}
		let body = ErrorBody::new(self.request_id, self.error.code(), self.error.public_message());
		(status, Json(body)).into_response()
	}
}

/// handler panic 之后由 CatchPanicLayer 生成的 500 响应上带的标记
/// extract_and_check 看到它会换成带请求 id 的错误体
#[derive(Debug, Clone)]
struct HandlerPanic(String);

fn handle_panic(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
	let detail = payload
		.downcast_ref::<String>()
		.cloned()
		.or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
		.unwrap_or_else(|| "unknown panic payload".to_string());
	let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
	response.extensions_mut().insert(HandlerPanic(detail));
	response
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
	let value = headers.get(name)?.to_str().ok()?;
	// X-Forwarded-For 取第一个 即最初的客户端
	let ip = value.split(',').next()?.trim();
	if ip.is_empty() { None } else { Some(ip.to_string()) }
}

/// 限流用的客户端 ip
/// 默认取对端地址 只有信任反向代理时才看 X-Real-IP > X-Forwarded-For
fn client_ip(request: &Request, trust_proxy_headers: bool) -> String {
	let forwarded = if trust_proxy_headers { header_ip(request.headers(), "x-real-ip").or_else(|| header_ip(request.headers(), "x-forwarded-for")) } else { None };
	forwarded
		.or_else(|| request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip().to_string()))
		.unwrap_or_else(|| "unknown".to_string())
}

//中间件 所有请求都经过 负责 ip、请求 id、限流、访问日志和指标
async fn extract_and_check(State(state): State<RouterState>, mut request: Request, next: Next) -> Response {
	let started = Instant::now();
	let ip = client_ip(&request, state.trust_proxy_headers);
	let request_id = request.headers().get(REQUEST_ID_HEADER).and_then(|header| header.to_str().ok()).map(|header| header.to_string()).unwrap_or_else(|| Uuid::new_v4().to_string());
	let method = request.method().clone();
	let path = request.uri().path().to_string();

	// check 探活和指标接口不限流
	let limited = path != HEALTHZ_PATH && path != METRICS_PATH;
	let mut response = if limited && !state.rate_limiter.is_allowed(&ip) {
		warn!("request_id={}, ip={} - rate limit exceeded on {} {}", request_id, ip, method, path);
		let body = ErrorBody::new(request_id.clone(), "RATE_LIMIT_EXCEEDED", "too many requests".to_string());
		(StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
	} else {
		request.extensions_mut().insert(RequestContext { request_id: request_id.clone(), ip: ip.clone() });
		next.run(request).await
	};

	if let Some(HandlerPanic(detail)) = response.extensions_mut().remove::<HandlerPanic>() {
		let error = AppError::Internal(anyhow::anyhow!("handler panicked on {} {}: {}", method, path, detail));
		response = ApiError { request_id: request_id.clone(), error }.into_response();
	}

	let status = response.status().as_u16();
	info!("request_id={}, ip={} - {} {} {} {:?}", request_id, ip, method, path, status, started.elapsed());
	// 未命中的路径统一成一个 label
	let route = if response.status() == StatusCode::NOT_FOUND { "unmatched" } else { path.as_str() };
	metrics::record_request(method.as_str(), route, status, started);
	response
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
	fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(|value| value.to_str().ok())
	}

	fn keys(&self) -> Vec<&str> {
		self.0.keys().map(|key| key.as_str()).collect()
	}
}

/// 每个请求一个 server span 继承 traceparent 并在响应头里返回 trace id
async fn trace_request(request: Request, next: Next) -> Response {
	let parent = TraceContextPropagator::new().extract(&HeaderExtractor(request.headers()));
	let span = info_span!(
		"http_request",
		otel.name = %format!("{} {}", request.method(), request.uri().path()),
		otel.kind = "server",
		http.request.method = %request.method(),
		url.path = %request.uri().path(),
		http.response.status_code = tracing::field::Empty,
	);
	span.set_parent(parent);
	let span_context = span.context().span().span_context().clone();

	let mut response = next.run(request).instrument(span.clone()).await;
	span.record("http.response.status_code", response.status().as_u16());
	if span_context.is_valid()
		&& let Ok(value) = HeaderValue::from_str(&span_context.trace_id().to_string())
	{
		response.headers_mut().insert(TRACE_ID_HEADER, value);
	}
	response
}

fn cors_layer(config: &CorsConfig) -> anyhow::Result<CorsLayer> {
	let origins = config.allow_origins.trim();
	let allow_origin = if origins.is_empty() || origins == "*" {
		AllowOrigin::from(Any)
	} else {
		let list = origins.split(',').map(|origin| HeaderValue::from_str(origin.trim())).collect::<Result<Vec<_>, _>>()?;
		AllowOrigin::list(list)
	};
	Ok(CorsLayer::new().allow_methods(Any).allow_origin(allow_origin).allow_headers(Any).expose_headers(Any))
}

/// 构造 http 路由 返回限流器给调用方跑 gc
pub fn app(usecase: Arc<dyn Translation>, config: &AppConfig) -> anyhow::Result<(Router, Arc<RateLimiter>)> {
	let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.max, config.rate_limit.interval_secs)?);
	let state = RouterState { usecase, rate_limiter: rate_limiter.clone(), trust_proxy_headers: config.http.trust_proxy_headers };
	let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

	let sub_router = Router::new().route("/translation/history", get(handle_history)).route("/translation/do-translate", post(handle_translate)).with_state(state.clone());

	let mut router = Router::new().route(HEALTHZ_PATH, get(handle_healthz)).nest("/v1", sub_router);
	if config.metrics.enabled {
		let handle = metrics::init_prometheus();
		router = router.route(METRICS_PATH, get(move || std::future::ready(handle.render())));
	}

	let mut router = router
		.layer(CatchPanicLayer::custom(handle_panic)) //handler panic 转成 500
		.layer(middleware::from_fn_with_state(state, extract_and_check));
	if config.tracer.enabled {
		router = router.layer(middleware::from_fn(trace_request));
	}

	let router = router
		.layer(PropagateRequestIdLayer::new(x_request_id.clone())) //将请求id从请求头中传递到响应头中
		.layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid)) //生成请求id 并放到请求头中
		.layer(cors_layer(&config.cors)?)
		.layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff")))
		.layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY")))
		.layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("x-xss-protection"), HeaderValue::from_static("0")))
		.layer(SetResponseHeaderLayer::overriding(HeaderName::from_static("referrer-policy"), HeaderValue::from_static("no-referrer")));

	Ok((router, rate_limiter))
}

async fn handle_healthz() -> StatusCode {
	StatusCode::OK
}

async fn handle_history(State(state): State<RouterState>, Extension(ctx): Extension<RequestContext>) -> Result<Json<TranslationHistory>, ApiError> {
	let history = state.usecase.history().await.map_err(|error| ApiError { request_id: ctx.request_id, error })?;
	Ok(Json(history))
}

async fn handle_translate(
	State(state): State<RouterState>,
	Extension(ctx): Extension<RequestContext>,
	payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslationRecord>, ApiError> {
	let Json(request) = payload.map_err(|e| ApiError { request_id: ctx.request_id.clone(), error: AppError::Validation(e.body_text()) })?;
	let translation = state.usecase.translate(request).await.map_err(|error| ApiError { request_id: ctx.request_id, error })?;
	Ok(Json(translation))
}
