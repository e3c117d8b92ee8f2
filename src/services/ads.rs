use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::Advertisement;

/// Ads to show at `now`: switched on and inside their date window.
#[tracing::instrument(name = "Select active advertisements", skip(db))]
pub async fn active_ads(db: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Advertisement>, AppError> {
    let candidates = sqlx::query_as::<_, Advertisement>(
        r#"SELECT id, title, ad_type, content, image, url, start_date, end_date, is_active, created_at
           FROM advertisements WHERE is_active = 1
           ORDER BY created_at DESC, id DESC"#,
    )
    .fetch_all(db)
    .await?;

    let live: Vec<Advertisement> = candidates.into_iter().filter(|ad| ad.is_live_at(now)).collect();
    tracing::debug!("{} advertisements live", live.len());
    Ok(live)
}
