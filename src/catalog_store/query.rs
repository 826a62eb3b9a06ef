//! Catalog query engine: predicate composition and pagination.
//!
//! Pure functions over a store snapshot. Filtering never fails: unknown
//! genres match nothing, out-of-range pages come back empty with correct
//! totals, and bad paging values are clamped.

use serde::{Deserialize, Serialize};

use super::models::Movie;

pub const DEFAULT_PAGE_SIZE: usize = 12;
pub const MAX_PAGE_SIZE: usize = 100;

/// Genre value that clients send to mean "no genre filter".
pub const ALL_GENRES_SENTINEL: &str = "All Genres";

/// Composable movie predicates. All supplied predicates must hold (AND).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MovieFilter {
    /// Case-insensitive substring match against title or description.
    pub search: Option<String>,
    /// Exact match against the genre string.
    pub genre: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

impl MovieFilter {
    pub fn matches(&self, movie: &Movie) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !needle.is_empty()
                && !movie.title.to_lowercase().contains(&needle)
                && !movie.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(genre) = &self.genre {
            if movie.genre.as_str() != genre {
                return false;
            }
        }
        if let Some(year_from) = self.year_from {
            if movie.release_year < year_from {
                return false;
            }
        }
        if let Some(year_to) = self.year_to {
            if movie.release_year > year_to {
                return false;
            }
        }
        true
    }
}

/// A 1-indexed page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamps `page` to >= 1 and `page_size` to [1, MAX_PAGE_SIZE].
    pub fn normalized(self) -> Self {
        PageRequest {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// One page of results plus the pre-pagination totals.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Slices one page out of an already-filtered, already-ordered list.
///
/// `total_pages` is 0 when there are no items, never 1.
pub fn paginate<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    let request = request.normalized();
    let total = items.len();
    let total_pages = total.div_ceil(request.page_size);

    let skip = (request.page - 1).saturating_mul(request.page_size);
    let items = items
        .iter()
        .skip(skip)
        .take(request.page_size)
        .cloned()
        .collect();

    Page {
        items,
        total,
        page: request.page,
        page_size: request.page_size,
        total_pages,
    }
}

/// Filters the snapshot and slices the requested page.
///
/// The snapshot's order (ascending id as handed out by the stores) is
/// preserved, so identical calls always return identical pages.
pub fn query_movies(movies: &[Movie], filter: &MovieFilter, request: PageRequest) -> Page<Movie> {
    let matching: Vec<Movie> = movies
        .iter()
        .filter(|movie| filter.matches(movie))
        .cloned()
        .collect();
    paginate(&matching, request)
}

/// Query-string surface of the movie list endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieQueryParams {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl MovieQueryParams {
    pub fn filter(&self) -> MovieFilter {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let genre = self
            .genre
            .as_deref()
            .filter(|g| !g.is_empty() && *g != ALL_GENRES_SENTINEL)
            .map(str::to_owned);
        MovieFilter {
            search,
            genre,
            year_from: self.year_from,
            year_to: self.year_to,
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .normalized()
    }
}

/// Query-string surface of the rating list endpoints.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageParams {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
        .normalized()
    }
}
