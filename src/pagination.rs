use serde::{Deserialize, Serialize};

pub const POSTS_PER_PAGE: i64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
}

/// Splits `count` rows into pages of `per_page`.
///
/// There is always at least one page, even for an empty listing. Requested
/// page numbers that are not numbers fall back to the first page, numbers
/// past either end are clamped.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    pub fn num_pages(&self) -> i64 {
        ((self.count + self.per_page - 1) / self.per_page).max(1)
    }

    pub fn page_number(&self, requested: Option<&str>) -> i64 {
        let number = match requested.map(str::trim) {
            Some("last") => self.num_pages(),
            Some(raw) => raw.parse::<i64>().unwrap_or(1),
            None => 1,
        };
        number.clamp(1, self.num_pages())
    }

    pub fn offset(&self, number: i64) -> i64 {
        (number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn page<T>(&self, number: i64, object_list: Vec<T>) -> PageObj<T> {
        PageObj {
            number,
            num_pages: self.num_pages(),
            count: self.count,
            has_next: number < self.num_pages(),
            has_previous: number > 1,
            object_list,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageObj<T> {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub object_list: Vec<T>,
}
