//! Typed references from user interactions to catalog items.
//!
//! Ratings and reviews may point at a movie, a series or an episode; downloads
//! and watch history only at something playable (movie or episode). The
//! reference is a single tagged value, persisted as `(target_kind, target_id)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
    Episode,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Series => "series",
            ContentKind::Episode => "episode",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ContentKind::Movie),
            "series" => Ok(ContentKind::Series),
            "episode" => Ok(ContentKind::Episode),
            other => Err(AppError::Validation(format!("Invalid content type '{}'", other))),
        }
    }
}

/// Exactly one movie, series or episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ContentRef {
    Movie(i64),
    Series(i64),
    Episode(i64),
}

impl ContentRef {
    pub fn new(kind: ContentKind, id: i64) -> Self {
        match kind {
            ContentKind::Movie => ContentRef::Movie(id),
            ContentKind::Series => ContentRef::Series(id),
            ContentKind::Episode => ContentRef::Episode(id),
        }
    }

    /// Picks the single supplied reference out of three optional ones.
    /// Zero or several supplied references are rejected.
    pub fn from_optional(
        movie: Option<i64>,
        series: Option<i64>,
        episode: Option<i64>,
    ) -> Result<Self, AppError> {
        match (movie, series, episode) {
            (Some(id), None, None) => Ok(ContentRef::Movie(id)),
            (None, Some(id), None) => Ok(ContentRef::Series(id)),
            (None, None, Some(id)) => Ok(ContentRef::Episode(id)),
            (None, None, None) => Err(AppError::Validation(
                "A movie, series or episode must be selected".to_string(),
            )),
            _ => Err(AppError::Validation(
                "Only one of movie, series or episode may be selected".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentRef::Movie(_) => ContentKind::Movie,
            ContentRef::Series(_) => ContentKind::Series,
            ContentRef::Episode(_) => ContentKind::Episode,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            ContentRef::Movie(id) | ContentRef::Series(id) | ContentRef::Episode(id) => id,
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind(), self.id())
    }
}

/// A movie or an episode: the things that have a video file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PlayableRef {
    Movie(i64),
    Episode(i64),
}

impl PlayableRef {
    pub fn kind(&self) -> ContentKind {
        match self {
            PlayableRef::Movie(_) => ContentKind::Movie,
            PlayableRef::Episode(_) => ContentKind::Episode,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            PlayableRef::Movie(id) | PlayableRef::Episode(id) => id,
        }
    }

    /// Parses the `<content_type>` path segment used by the progress endpoint.
    pub fn parse(kind: &str, id: i64) -> Result<Self, AppError> {
        match kind.parse::<ContentKind>()? {
            ContentKind::Movie => Ok(PlayableRef::Movie(id)),
            ContentKind::Episode => Ok(PlayableRef::Episode(id)),
            ContentKind::Series => Err(AppError::Validation("Invalid content type".to_string())),
        }
    }
}

impl From<PlayableRef> for ContentRef {
    fn from(value: PlayableRef) -> Self {
        match value {
            PlayableRef::Movie(id) => ContentRef::Movie(id),
            PlayableRef::Episode(id) => ContentRef::Episode(id),
        }
    }
}

impl TryFrom<ContentRef> for PlayableRef {
    type Error = AppError;

    fn try_from(value: ContentRef) -> Result<Self, Self::Error> {
        match value {
            ContentRef::Movie(id) => Ok(PlayableRef::Movie(id)),
            ContentRef::Episode(id) => Ok(PlayableRef::Episode(id)),
            ContentRef::Series(_) => Err(AppError::Validation(
                "Series cannot be downloaded or watched directly".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_reference_is_accepted() {
        assert_eq!(
            ContentRef::from_optional(None, Some(4), None).unwrap(),
            ContentRef::Series(4)
        );
        assert!(ContentRef::from_optional(None, None, None).is_err());
        assert!(ContentRef::from_optional(Some(1), None, Some(2)).is_err());
    }

    #[test]
    fn playable_rejects_series() {
        assert!(PlayableRef::parse("series", 3).is_err());
        assert!(PlayableRef::parse("podcast", 3).is_err());
        assert_eq!(PlayableRef::parse("episode", 3).unwrap(), PlayableRef::Episode(3));
        assert!(PlayableRef::try_from(ContentRef::Series(1)).is_err());
    }

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [ContentKind::Movie, ContentKind::Series, ContentKind::Episode] {
            assert_eq!(kind.as_str().parse::<ContentKind>().unwrap(), kind);
        }
    }
}
