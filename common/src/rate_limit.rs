use {
	crate::consts::RATE_LIMIT_MAX_INTERVAL_SECS,
	chrono::Utc,
	dashmap::DashMap,
	std::sync::Arc,
	tokio::time::Duration,
	tracing::info,
};

const CHECK_INTERVAL_SECS: u64 = 1800; // gc 间隔
const CHECK_NUM: u32 = 200; // 每轮最多检查多少个 key

/// 每 interval 秒 limit 个请求
#[derive(Debug, Clone, Copy)]
pub struct Rule {
	pub limit: u32,
	pub interval_secs: i64,
}

impl Rule {
	pub fn interval_ms(&self) -> i64 {
		self.interval_secs.saturating_mul(1000)
	}
}

//没有最大容量 到点直接填满 refill_amount 个
#[derive(Debug, Clone)]
pub struct Bucket {
	pub available: u32,
	pub next_refill_at: i64,   //毫秒
	pub last_access_time: i64, //毫秒
}

impl Bucket {
	fn new(rule: Rule, now: i64) -> Self {
		Self { available: rule.limit, next_refill_at: now.saturating_add(rule.interval_ms()), last_access_time: now }
	}

	fn consume(&mut self, rule: Rule, now: i64) -> bool {
		if now >= self.next_refill_at {
			self.available = rule.limit;
			let interval_ms = rule.interval_ms();
			let intervals = (now - self.next_refill_at) / interval_ms + 1;
			self.next_refill_at = self.next_refill_at.saturating_add(intervals.saturating_mul(interval_ms));
		}
		self.last_access_time = now;
		if self.available > 0 {
			self.available -= 1;
			true
		} else {
			false
		}
	}
}

/// key(ip) -> bucket 的令牌桶限流器 所有 key 共用同一条规则
/// 内部是 dashmap 所以直接 Arc 共享 不需要额外加锁
pub struct RateLimiter {
	rule: Rule,
	buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
	// 确保 limit 和 interval 大于 0 且 interval 不超过上限
	pub fn new(limit: u32, interval_secs: i64) -> anyhow::Result<Self> {
		if limit == 0 || interval_secs <= 0 {
			return Err(anyhow::anyhow!("limit and interval must be greater than 0"));
		}
		if interval_secs > RATE_LIMIT_MAX_INTERVAL_SECS {
			return Err(anyhow::anyhow!("interval must not exceed {} seconds", RATE_LIMIT_MAX_INTERVAL_SECS));
		}
		Ok(Self { rule: Rule { limit, interval_secs }, buckets: DashMap::new() })
	}

	pub fn rule(&self) -> Rule {
		self.rule
	}

	pub fn is_allowed(&self, key: &str) -> bool {
		self.is_allowed_at(key, Utc::now().timestamp_millis())
	}

	pub fn is_allowed_at(&self, key: &str, now: i64) -> bool {
		let rule = self.rule;
		let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket::new(rule, now));
		bucket.consume(rule, now)
	}

	pub fn len(&self) -> usize {
		self.buckets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}

	/// 随机抽样删除超过 expire_ms 没访问的 key 返回删除数量
	pub fn gc_at(&self, now: i64, expire_ms: i64) -> usize {
		let mut delete_keys = Vec::new();
		let mut checked_count = 0;
		for entry in self.buckets.iter() {
			if checked_count > CHECK_NUM {
				break;
			}
			if entry.value().last_access_time + expire_ms <= now {
				delete_keys.push(entry.key().clone());
			}
			checked_count += 1;
		}
		//dashmap 上 retain 效率偏低
		for key in &delete_keys {
			self.buckets.remove(key);
		}
		delete_keys.len()
	}
}

/// 定期清理长时间没有访问的 bucket 过期时间取规则间隔的 4 倍
pub async fn rate_limit_gc(rate_limiter: Arc<RateLimiter>) {
	let mut tokio_interval = tokio::time::interval(Duration::from_secs(CHECK_INTERVAL_SECS));
	tokio_interval.tick().await;
	let expire_ms = rate_limiter.rule().interval_ms().saturating_mul(4);

	loop {
		tokio_interval.tick().await;
		// 随机跳过一部分轮次 避免每次都全量扫描
		if fastrand::bool() {
			continue;
		}
		let deleted = rate_limiter.gc_at(Utc::now().timestamp_millis(), expire_ms);
		info!("rate limit gc deleted {} keys", deleted);
	}
}
