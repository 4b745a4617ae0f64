use sqlx::PgPool;

use crate::DbError;

/// Starter catalog sections as `(name, name_ar)`.
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Beef", "لحم بقر"),
    ("Lamb", "لحم غنم"),
    ("Chicken", "دجاج"),
    ("Marinated", "متبلات"),
];

/// Ensure the settings row exists with column defaults.
///
/// Returns `true` when the row was created by this call.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn seed_defaults(pool: &PgPool) -> Result<bool, DbError> {
    let result = sqlx::query("INSERT INTO settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Insert the starter categories that are not already present by name.
///
/// Returns the number of categories inserted. Runs in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn seed_default_categories(pool: &PgPool) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for &(name, name_ar) in DEFAULT_CATEGORIES {
        let result = sqlx::query(
            "INSERT INTO categories (name, name_ar) \
             SELECT $1, $2 \
             WHERE NOT EXISTS (SELECT 1 FROM categories WHERE LOWER(name) = LOWER($1))",
        )
        .bind(name)
        .bind(name_ar)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    tracing::info!(inserted, "default categories seeded");
    Ok(inserted)
}
