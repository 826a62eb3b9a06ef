mod models;
mod service;

pub use models::{Rating, RatingDraft, RatingOutcome, RatingStats, MAX_RATING, MIN_RATING};
pub use service::{RatingService, SubmitRatingError};
