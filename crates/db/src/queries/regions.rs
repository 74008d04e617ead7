use crate::models::RegionRow;
use sqlx::PgPool;

pub async fn list_for_screen(pool: &PgPool, screen_id: i64) -> Result<Vec<RegionRow>, sqlx::Error> {
    sqlx::query_as::<_, RegionRow>(
        r#"
        SELECT id, screen_id, region, channel_id, shared_channel_id
        FROM channel_screen_regions
        WHERE screen_id = $1
        ORDER BY id
        "#,
    )
    .bind(screen_id)
    .fetch_all(pool)
    .await
}

pub async fn list_for_channels(
    pool: &PgPool,
    channel_ids: &[i64],
) -> Result<Vec<RegionRow>, sqlx::Error> {
    sqlx::query_as::<_, RegionRow>(
        r#"
        SELECT id, screen_id, region, channel_id, shared_channel_id
        FROM channel_screen_regions
        WHERE channel_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(channel_ids)
    .fetch_all(pool)
    .await
}

pub async fn list_for_shared_channels(
    pool: &PgPool,
    unique_ids: &[String],
) -> Result<Vec<RegionRow>, sqlx::Error> {
    sqlx::query_as::<_, RegionRow>(
        r#"
        SELECT id, screen_id, region, channel_id, shared_channel_id
        FROM channel_screen_regions
        WHERE shared_channel_id = ANY($1)
        ORDER BY id
        "#,
    )
    .bind(unique_ids)
    .fetch_all(pool)
    .await
}
