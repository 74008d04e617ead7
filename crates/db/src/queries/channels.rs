use crate::models::{ChannelRow, ChannelSharingIndexRow};
use sqlx::PgPool;

pub async fn list_all(pool: &PgPool) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, title, last_push_hash, last_push_screens, created_at, modified_at
        FROM channels
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, title, last_push_hash, last_push_screens, created_at, modified_at
        FROM channels
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<ChannelRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, title, last_push_hash, last_push_screens, created_at, modified_at
        FROM channels
        WHERE id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn list_sharing_indexes(
    pool: &PgPool,
    channel_ids: &[i64],
) -> Result<Vec<ChannelSharingIndexRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelSharingIndexRow>(
        r#"
        SELECT csi.channel_id, si.id, si.name, si.index_key
        FROM channel_sharing_indexes csi
        JOIN sharing_indexes si ON si.id = csi.sharing_index_id
        WHERE csi.channel_id = ANY($1)
        ORDER BY csi.channel_id, si.id
        "#,
    )
    .bind(channel_ids)
    .fetch_all(pool)
    .await
}

pub async fn update_push_state(
    pool: &PgPool,
    id: i64,
    last_push_hash: Option<&str>,
    last_push_screens: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE channels
        SET last_push_hash = $1,
            last_push_screens = $2
        WHERE id = $3
        "#,
    )
    .bind(last_push_hash)
    .bind(last_push_screens)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
