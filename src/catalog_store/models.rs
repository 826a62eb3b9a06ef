//! Movie catalog models.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// First year a motion picture could plausibly have been released.
pub const MIN_RELEASE_YEAR: i32 = 1888;

pub fn max_release_year(now: DateTime<Utc>) -> i32 {
    // Allow announced titles one year out
    now.year() + 1
}

/// Genre enumeration. The string form is the API/database representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Action,
    Adventure,
    Animation,
    Biography,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Family,
    Fantasy,
    Historical,
    Horror,
    Musical,
    Mystery,
    Romance,
    #[serde(rename = "Sci-Fi")]
    SciFi,
    Sports,
    Thriller,
    War,
    Western,
}

pub const ALL_GENRES: &[Genre] = &[
    Genre::Action,
    Genre::Adventure,
    Genre::Animation,
    Genre::Biography,
    Genre::Comedy,
    Genre::Crime,
    Genre::Documentary,
    Genre::Drama,
    Genre::Family,
    Genre::Fantasy,
    Genre::Historical,
    Genre::Horror,
    Genre::Musical,
    Genre::Mystery,
    Genre::Romance,
    Genre::SciFi,
    Genre::Sports,
    Genre::Thriller,
    Genre::War,
    Genre::Western,
];

impl Genre {
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Biography => "Biography",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Family => "Family",
            Genre::Fantasy => "Fantasy",
            Genre::Historical => "Historical",
            Genre::Horror => "Horror",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Sports => "Sports",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ALL_GENRES.iter().copied().find(|g| g.as_str() == s)
    }
}

/// A movie in the catalog.
///
/// `ratings_count` and `ratings_avg` are cached aggregates, recomputed from
/// the rating set after every rating write. They are never the source of
/// truth.
#[derive(Clone, Debug, Serialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub release_year: i32,
    pub created_by: usize,
    pub created_at: DateTime<Utc>,
    pub ratings_count: usize,
    pub ratings_avg: f64,
}

/// A single invalid or missing field in a request payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldViolation {
            field,
            message: message.into(),
        }
    }
}

/// Unvalidated movie creation payload, as received from the client.
///
/// `genre` stays a string and `release_year` an `Option` so that a malformed
/// payload produces field violations instead of a deserialization failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    pub release_year: Option<i32>,
}

/// A validated movie creation payload, ready for the catalog store.
#[derive(Clone, Debug)]
pub struct NewMovie {
    pub title: String,
    pub description: String,
    pub genre: Genre,
    pub release_year: i32,
}

impl MovieDraft {
    /// Validates the draft, reporting every violated field at once.
    pub fn validate(self, now: DateTime<Utc>) -> Result<NewMovie, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        let title = self.title.trim().to_owned();
        if title.is_empty() {
            violations.push(FieldViolation::new("title", "title must not be empty"));
        }

        let description = self.description.trim().to_owned();
        if description.is_empty() {
            violations.push(FieldViolation::new(
                "description",
                "description must not be empty",
            ));
        }

        let genre = match Genre::parse(&self.genre) {
            Some(genre) => Some(genre),
            None => {
                violations.push(FieldViolation::new(
                    "genre",
                    format!("'{}' is not a known genre", self.genre),
                ));
                None
            }
        };

        let max_year = max_release_year(now);
        let release_year = match self.release_year {
            None => {
                violations.push(FieldViolation::new(
                    "release_year",
                    "release_year is required",
                ));
                None
            }
            Some(year) if !(MIN_RELEASE_YEAR..=max_year).contains(&year) => {
                violations.push(FieldViolation::new(
                    "release_year",
                    format!(
                        "release_year must be between {} and {}",
                        MIN_RELEASE_YEAR, max_year
                    ),
                ));
                None
            }
            Some(year) => Some(year),
        };

        if !violations.is_empty() {
            return Err(violations);
        }

        Ok(NewMovie {
            title,
            description,
            // Both are Some when no violation was recorded
            genre: genre.unwrap(),
            release_year: release_year.unwrap(),
        })
    }
}
