//! Reads against the primary content store and the legacy fallback files.
//!
//! Column values cross the boundary as text (`::text` casts) and are mapped
//! into the typed public records right here; loose JSON stays confined to the
//! fallback files.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::path::Path;
use tracing::Instrument;

use super::records::{Facility, Testimonial};

pub(crate) async fn list_facilities(pool: &PgPool) -> Result<Vec<Facility>> {
    let query = r"
        SELECT id::text AS id,
               COALESCE(title, '') AS title,
               COALESCE(description, '') AS description,
               image_url,
               COALESCE(created_at::text, '') AS created_at
        FROM facilities
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list facilities")?;

    Ok(rows
        .into_iter()
        .map(|row| Facility {
            id: row.get("id"),
            title: row.get("title"),
            description: row.get("description"),
            image_url: row.get("image_url"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub(crate) async fn count_facilities(pool: &PgPool) -> Result<i64> {
    let query = "SELECT COUNT(*) AS count FROM facilities";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count facilities")?;
    Ok(row.get("count"))
}

pub(crate) async fn list_testimonials(pool: &PgPool) -> Result<Vec<Testimonial>> {
    let query = r"
        SELECT id::text AS id,
               COALESCE(client_name, 'Anonymous') AS client_name,
               COALESCE(client_role, 'Parent') AS client_role,
               COALESCE(content, '') AS content,
               COALESCE(rating, 5) AS rating,
               COALESCE(is_featured, FALSE) AS is_featured,
               COALESCE(created_at::text, '') AS created_at
        FROM testimonials
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list testimonials")?;

    Ok(rows
        .into_iter()
        .map(|row| Testimonial {
            id: row.get("id"),
            client_name: row.get("client_name"),
            client_role: row.get("client_role"),
            content: row.get("content"),
            rating: row.get("rating"),
            is_featured: row.get("is_featured"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub(crate) async fn count_testimonials(pool: &PgPool) -> Result<i64> {
    let query = "SELECT COUNT(*) AS count FROM testimonials";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count testimonials")?;
    Ok(row.get("count"))
}

/// One settings category, or `None` when the row does not exist.
pub(crate) async fn settings_category(pool: &PgPool, category: &str) -> Result<Option<Value>> {
    let query = "SELECT settings::text AS settings FROM settings WHERE category = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(category)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch settings category")?;

    match row {
        Some(row) => {
            let raw: String = row.get("settings");
            let value =
                serde_json::from_str(&raw).context("settings category is not valid JSON")?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// All settings categories keyed by name.
pub(crate) async fn all_settings(pool: &PgPool) -> Result<Vec<(String, Value)>> {
    let query = "SELECT category, settings::text AS settings FROM settings";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to fetch settings")?;

    let mut categories = Vec::with_capacity(rows.len());
    for row in rows {
        let raw: String = row.get("settings");
        let value: Value =
            serde_json::from_str(&raw).context("settings category is not valid JSON")?;
        categories.push((row.get("category"), value));
    }
    Ok(categories)
}

/// Read a legacy fallback file: a flat JSON array of loose records.
///
/// A missing file is not an error; a present-but-invalid file is, so the
/// diagnostics can say why the fallback contributed nothing.
pub(crate) async fn read_fallback(path: &Path) -> Result<Vec<Value>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(Vec::new());
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read fallback file {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("fallback file {} is not valid JSON", path.display()))?;
    Ok(parsed.as_array().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("jollysite-store-test-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn missing_fallback_file_is_empty_not_an_error() {
        let records = read_fallback(Path::new("/nonexistent/facilities.json"))
            .await
            .expect("missing file tolerated");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn fallback_file_round_trips_an_array() {
        let path = scratch_file("array.json");
        tokio::fs::write(&path, r#"[{"id": "1", "title": "A"}]"#)
            .await
            .expect("write");

        let records = read_fallback(&path).await.expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get("title").and_then(|v| v.as_str()),
            Some("A")
        );

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn empty_and_non_array_fallback_files_yield_nothing() {
        let path = scratch_file("empty.json");
        tokio::fs::write(&path, "").await.expect("write");
        assert!(read_fallback(&path).await.expect("read").is_empty());

        tokio::fs::write(&path, r#"{"not": "an array"}"#)
            .await
            .expect("write");
        assert!(read_fallback(&path).await.expect("read").is_empty());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn corrupt_fallback_file_reports_an_error() {
        let path = scratch_file("corrupt.json");
        tokio::fs::write(&path, "[{not json").await.expect("write");
        assert!(read_fallback(&path).await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
