//! User profiles: created on first access, edited as a whole.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::{Category, UserProfile};

const DEFAULT_LANGUAGE: &str = "English";

/// Submitted profile fields. Empty strings mean "not set".
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub preferred_language: String,
    pub date_of_birth: Option<String>,
    pub country: String,
    pub favorite_category_ids: Vec<i64>,
}

impl ProfileUpdate {
    /// Builds an update from url-encoded pairs, where `favorite_genres` may
    /// repeat. Values that are not ids are dropped.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut update = ProfileUpdate::default();
        for (key, value) in pairs {
            match key.as_str() {
                "preferred_language" => update.preferred_language = value.trim().to_string(),
                "date_of_birth" => update.date_of_birth = Some(value.trim().to_string()),
                "country" => update.country = value.trim().to_string(),
                "favorite_genres" => {
                    if let Ok(id) = value.trim().parse::<i64>() {
                        update.favorite_category_ids.push(id);
                    }
                }
                _ => {}
            }
        }
        update
    }

    fn parsed_date_of_birth(&self) -> Result<Option<NaiveDate>, AppError> {
        match self.date_of_birth.as_deref().filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| AppError::Validation("Enter a valid date of birth (YYYY-MM-DD).".to_string())),
        }
    }
}

#[tracing::instrument(name = "Get or create profile", skip(db))]
pub async fn get_or_create(db: &SqlitePool, user_id: i64) -> Result<UserProfile, AppError> {
    let created = sqlx::query(
        "INSERT INTO user_profiles (user_id, preferred_language, country) VALUES (?, ?, '')
         ON CONFLICT(user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(DEFAULT_LANGUAGE)
    .execute(db)
    .await?
    .rows_affected();

    if created > 0 {
        tracing::info!("Created profile for user {}", user_id);
    }

    Ok(sqlx::query_as::<_, UserProfile>(
        "SELECT id, user_id, preferred_language, date_of_birth, country FROM user_profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?)
}

pub async fn favorite_categories(db: &SqlitePool, profile_id: i64) -> Result<Vec<Category>, AppError> {
    Ok(sqlx::query_as::<_, Category>(
        r#"SELECT c.id, c.name, c.slug, c.description, c.created_at
           FROM categories c JOIN profile_favorite_categories f ON f.category_id = c.id
           WHERE f.profile_id = ? ORDER BY c.name"#,
    )
    .bind(profile_id)
    .fetch_all(db)
    .await?)
}

/// Replaces every editable field and the favorite set in one transaction.
/// Ids that name no category are ignored.
#[tracing::instrument(name = "Update profile", skip(db, update))]
pub async fn update(db: &SqlitePool, user_id: i64, update: &ProfileUpdate) -> Result<UserProfile, AppError> {
    let date_of_birth = update.parsed_date_of_birth()?;
    let language = if update.preferred_language.is_empty() {
        DEFAULT_LANGUAGE
    } else {
        update.preferred_language.as_str()
    };

    let profile = get_or_create(db, user_id).await?;
    let mut tx = db.begin().await?;

    sqlx::query("UPDATE user_profiles SET preferred_language = ?, date_of_birth = ?, country = ? WHERE id = ?")
        .bind(language)
        .bind(date_of_birth)
        .bind(&update.country)
        .bind(profile.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM profile_favorite_categories WHERE profile_id = ?")
        .bind(profile.id)
        .execute(&mut *tx)
        .await?;

    for category_id in &update.favorite_category_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO profile_favorite_categories (profile_id, category_id)
             SELECT ?, id FROM categories WHERE id = ?",
        )
        .bind(profile.id)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("Profile of user {} updated", user_id);

    get_or_create(db, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn profile_is_created_once_with_defaults() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;

        let first = get_or_create(&db, user).await.unwrap();
        let second = get_or_create(&db, user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.preferred_language, "English");
        assert_eq!(first.date_of_birth, None);
    }

    #[tokio::test]
    async fn update_replaces_fields_and_favorites() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let action = seed_category(&db, "Action").await;
        let drama = seed_category(&db, "Drama").await;

        let pairs = vec![
            ("preferred_language".to_string(), "French".to_string()),
            ("date_of_birth".to_string(), "1990-04-02".to_string()),
            ("country".to_string(), "France".to_string()),
            ("favorite_genres".to_string(), action.to_string()),
            ("favorite_genres".to_string(), drama.to_string()),
            ("favorite_genres".to_string(), "9999".to_string()),
        ];
        let profile = update(&db, user, &ProfileUpdate::from_pairs(&pairs)).await.unwrap();
        assert_eq!(profile.preferred_language, "French");
        assert_eq!(profile.date_of_birth_value(), "1990-04-02");
        assert_eq!(profile.country, "France");

        let names: Vec<String> = favorite_categories(&db, profile.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Action", "Drama"]);

        let cleared = update(&db, user, &ProfileUpdate::default()).await.unwrap();
        assert_eq!(cleared.preferred_language, "English");
        assert!(favorite_categories(&db, cleared.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_birth_date_changes_nothing() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let update_with_bad_date = ProfileUpdate {
            date_of_birth: Some("02/04/1990".to_string()),
            country: "Peru".to_string(),
            ..ProfileUpdate::default()
        };

        assert!(matches!(
            update(&db, user, &update_with_bad_date).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(get_or_create(&db, user).await.unwrap().country, "");
    }
}
