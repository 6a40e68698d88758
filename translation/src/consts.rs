/// 历史记录默认查询条数
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// 单次翻译原文最大字符数
pub const MAX_ORIGINAL_CHARS: usize = 1000;

/// 每个服务停机的默认超时时间（秒）
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// 历史记录缓存 key
pub const HISTORY_CACHE_KEY: &str = "translation:history";

/// 翻译 web api
pub const TRANSLATE_API_URL: &str = "https://translate.googleapis.com/translate_a/single";
pub const TRANSLATE_API_TIMEOUT_SECS: u64 = 30;
pub const TRANSLATE_API_CONNECT_TIMEOUT_SECS: u64 = 10;

/// 消息中间件 rpc 的 handler 名称
pub const RPC_HANDLER_GET_HISTORY: &str = "v1.getHistory";
pub const RPC_HANDLER_TRANSLATE: &str = "v1.translate";

/// amqp 用 type 属性 nats 用 header 传 handler 和回复状态
pub const NATS_TYPE_HEADER: &str = "type";

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

pub const HEALTHZ_PATH: &str = "/healthz";
pub const METRICS_PATH: &str = "/metrics";

/// 消息中间件 rpc 同时处理的最大消息数
pub const RPC_MAX_INFLIGHT: usize = 32;
