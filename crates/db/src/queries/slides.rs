use crate::models::ChannelSlideRow;
use sqlx::PgPool;

/// Slides of the given channels in display order.
pub async fn list_for_channels(
    pool: &PgPool,
    channel_ids: &[i64],
) -> Result<Vec<ChannelSlideRow>, sqlx::Error> {
    sqlx::query_as::<_, ChannelSlideRow>(
        r#"
        SELECT cso.channel_id, cso.sort_order,
               s.id, s.title, s.template, s.options, s.media_type, s.duration,
               s.published, s.schedule_from, s.schedule_to, s.external_data,
               s.modified_at
        FROM channel_slide_orders cso
        JOIN slides s ON s.id = cso.slide_id
        WHERE cso.channel_id = ANY($1)
        ORDER BY cso.channel_id, cso.sort_order, s.id
        "#,
    )
    .bind(channel_ids)
    .fetch_all(pool)
    .await
}
