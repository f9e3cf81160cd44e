use sqlx::postgres::PgPool;

pub async fn health_check(pool: &PgPool) -> anyhow::Result<bool> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(true)
}
