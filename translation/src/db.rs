use {
	crate::{entity::Translation, usecase::TranslationRepo},
	async_trait::async_trait,
	common::{
		common_env::CommonEnv,
		postgres_pool::{PostgresConfig, PostgresEndpoint, init_postgres_pool},
	},
	sqlx::PgPool,
};

/// 初始化数据库连接池
pub async fn init_db_pool(env: &CommonEnv, config: &PostgresConfig) -> anyhow::Result<PgPool> {
	let endpoint = PostgresEndpoint { host: &env.postgres_host, port: env.postgres_port, user: &env.postgres_user, password: &env.postgres_password, database: &env.postgres_database };
	init_postgres_pool(&endpoint, config.pool_config()).await
}

/// history 表的读写 表结构见 deploy/sql/history.sql
pub struct PostgresTranslationRepo {
	pool: PgPool,
}

impl PostgresTranslationRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl TranslationRepo for PostgresTranslationRepo {
	async fn get_history(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Translation>> {
		let rows = sqlx::query_as::<_, Translation>(
			r#"
			SELECT source, destination, original, translation
			FROM history
			ORDER BY created_at DESC
			LIMIT $1 OFFSET $2
			"#,
		)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	async fn store(&self, translation: &Translation) -> anyhow::Result<()> {
		sqlx::query(
			r#"
			INSERT INTO history (source, destination, original, translation)
			VALUES ($1, $2, $3, $4)
			"#,
		)
		.bind(&translation.source)
		.bind(&translation.destination)
		.bind(&translation.original)
		.bind(&translation.translation)
		.execute(&self.pool)
		.await?;
		Ok(())
	}
}
