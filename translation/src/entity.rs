use {
	crate::consts::MAX_ORIGINAL_CHARS,
	serde::{Deserialize, Serialize},
	sqlx::FromRow,
	thiserror::Error,
};

/// 一条翻译记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Translation {
	pub source: String,
	pub destination: String,
	pub original: String,
	pub translation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationHistory {
	pub history: Vec<Translation>,
}

/// 翻译请求 所有 transport 共用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRequest {
	pub source: String,
	pub destination: String,
	pub original: String,
}

impl TranslateRequest {
	/// 校验参数值
	/// - source/destination/original 都不能为空
	/// - original 不能超过 MAX_ORIGINAL_CHARS 个字符
	pub fn validate(&self) -> Result<(), AppError> {
		if self.source.trim().is_empty() {
			return Err(AppError::Validation("source is required".to_string()));
		}
		if self.destination.trim().is_empty() {
			return Err(AppError::Validation("destination is required".to_string()));
		}
		if self.original.trim().is_empty() {
			return Err(AppError::Validation("original is required".to_string()));
		}
		if self.original.chars().count() > MAX_ORIGINAL_CHARS {
			return Err(AppError::Validation(format!("original must be at most {} characters", MAX_ORIGINAL_CHARS)));
		}
		Ok(())
	}
}

/// 业务错误 对外只暴露 code 和 public_message 内部原因只进日志
#[derive(Debug, Error)]
pub enum AppError {
	#[error("invalid input: {0}")]
	Validation(String),
	#[error("resource not found")]
	NotFound,
	#[error("external service unavailable: {0:#}")]
	ExternalService(anyhow::Error),
	#[error("internal error: {0:#}")]
	Internal(anyhow::Error),
}

impl AppError {
	pub fn code(&self) -> &'static str {
		match self {
			AppError::Validation(_) => "VALIDATION_ERROR",
			AppError::NotFound => "NOT_FOUND",
			AppError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
			AppError::Internal(_) => "INTERNAL_ERROR",
		}
	}

	pub fn public_message(&self) -> String {
		match self {
			AppError::Validation(msg) => msg.clone(),
			AppError::NotFound => "resource not found".to_string(),
			AppError::ExternalService(_) => "external service unavailable".to_string(),
			AppError::Internal(_) => "internal server error".to_string(),
		}
	}

	pub fn http_status(&self) -> u16 {
		match self {
			AppError::Validation(_) => 400,
			AppError::NotFound => 404,
			AppError::ExternalService(_) => 502,
			AppError::Internal(_) => 500,
		}
	}
}
