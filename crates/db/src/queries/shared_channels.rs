use crate::models::SharedChannelRow;
use sqlx::PgPool;

pub async fn list_all(pool: &PgPool) -> Result<Vec<SharedChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, SharedChannelRow>(
        r#"
        SELECT unique_id, index_key, content, last_push_hash, last_push_screens, modified_at
        FROM shared_channels
        ORDER BY unique_id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn list_by_ids(
    pool: &PgPool,
    unique_ids: &[String],
) -> Result<Vec<SharedChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, SharedChannelRow>(
        r#"
        SELECT unique_id, index_key, content, last_push_hash, last_push_screens, modified_at
        FROM shared_channels
        WHERE unique_id = ANY($1)
        "#,
    )
    .bind(unique_ids)
    .fetch_all(pool)
    .await
}

pub async fn update_push_state(
    pool: &PgPool,
    unique_id: &str,
    last_push_hash: Option<&str>,
    last_push_screens: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE shared_channels
        SET last_push_hash = $1,
            last_push_screens = $2
        WHERE unique_id = $3
        "#,
    )
    .bind(last_push_hash)
    .bind(last_push_screens)
    .bind(unique_id)
    .execute(pool)
    .await?;
    Ok(())
}
