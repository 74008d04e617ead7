use crate::models::ScreenRow;
use sqlx::PgPool;

pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<ScreenRow>, sqlx::Error> {
    sqlx::query_as::<_, ScreenRow>(
        r#"
        SELECT s.id, s.title, s.description, s.options, s.activation_code, s.modified_at,
               t.id AS template_id, t.name AS template_name,
               t.orientation AS template_orientation, t.options AS template_options
        FROM screens s
        JOIN screen_templates t ON t.id = s.template_id
        WHERE s.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
