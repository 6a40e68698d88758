use {
	crate::{
		consts::{TRANSLATE_API_CONNECT_TIMEOUT_SECS, TRANSLATE_API_TIMEOUT_SECS, TRANSLATE_API_URL},
		entity::{TranslateRequest, Translation},
		usecase::TranslationWebApi,
	},
	async_trait::async_trait,
	reqwest::Client,
	serde_json::Value,
	std::time::Duration,
};

/// google translate 公共接口 client=gtx 不需要 key
pub struct GoogleTranslateWebApi {
	client: Client,
	url: String,
}

impl GoogleTranslateWebApi {
	pub fn new() -> anyhow::Result<Self> {
		Self::with_url(TRANSLATE_API_URL)
	}

	pub fn with_url(url: &str) -> anyhow::Result<Self> {
		let client = Client::builder().timeout(Duration::from_secs(TRANSLATE_API_TIMEOUT_SECS)).connect_timeout(Duration::from_secs(TRANSLATE_API_CONNECT_TIMEOUT_SECS)).build()?;
		Ok(Self { client, url: url.to_string() })
	}
}

#[async_trait]
impl TranslationWebApi for GoogleTranslateWebApi {
	async fn translate(&self, request: &TranslateRequest) -> anyhow::Result<Translation> {
		let response = self
			.client
			.get(&self.url)
			.query(&[("client", "gtx"), ("dt", "t"), ("sl", request.source.as_str()), ("tl", request.destination.as_str()), ("q", request.original.as_str())])
			.send()
			.await?
			.error_for_status()?;
		let body: Value = response.json().await?;
		let translation = parse_gtx_response(&body).ok_or_else(|| anyhow::anyhow!("Unexpected translate api response: {}", body))?;

		Ok(Translation { source: request.source.clone(), destination: request.destination.clone(), original: request.original.clone(), translation })
	}
}

/// 响应格式 [[["译文片段","原文片段",...],...],...] 把所有片段拼起来
pub fn parse_gtx_response(body: &Value) -> Option<String> {
	let segments = body.get(0)?.as_array()?;
	let mut translation = String::new();
	for segment in segments {
		if let Some(part) = segment.get(0).and_then(Value::as_str) {
			translation.push_str(part);
		}
	}
	if translation.is_empty() { None } else { Some(translation) }
}
