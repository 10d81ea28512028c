use rocket::{
    form::FromForm,
    http::Status,
    request::{FromRequest, Outcome, Request},
};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    model::common::election::{ElectionStatus, ElectionType},
};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Largest number of results a page may start after. MongoDB skips are signed.
const MAX_SKIP: u64 = i64::MAX as u64;

/// Optional filters for listing elections, read from the `status`, `type`
/// and `search` query parameters. A value that is present but unrecognised
/// is a validation error rather than a missing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionFilter {
    /// Matches the derived status.
    pub status: Option<ElectionStatus>,
    pub election_type: Option<ElectionType>,
    /// Case-insensitive substring of the title or description.
    pub search: Option<String>,
}

impl ElectionFilter {
    /// The search term, if it is non-blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    fn from_query(req: &Request<'_>) -> Result<Self> {
        Ok(Self {
            status: query_field(req, "status", "Unknown election status")?,
            election_type: query_field(req, "type", "Unknown election type")?,
            search: query_field(req, "search", "Malformed search term")?,
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ElectionFilter {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match Self::from_query(req) {
            Ok(filter) => Outcome::Success(filter),
            Err(err) => Outcome::Failure((Status::BadRequest, err)),
        }
    }
}

/// Parse an optional query parameter, failing if it is present but malformed.
fn query_field<'r, T>(req: &'r Request<'_>, name: &str, message: &str) -> Result<Option<T>>
where
    T: FromForm<'r>,
{
    req.query_value::<T>(name)
        .transpose()
        .map_err(|_| Error::Validation(format!("{message} in `{name}`")))
}

/// A requested page of results. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u64,
    page_size: u64,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64) -> Result<Self> {
        if page == 0 {
            return Err(Error::Validation("Page numbers start at 1".to_string()));
        }
        if page_size == 0 {
            return Err(Error::Validation(
                "Page size must be at least 1".to_string(),
            ));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        match (page - 1).checked_mul(page_size) {
            Some(skip) if skip <= MAX_SKIP => Ok(Self { page, page_size }),
            _ => Err(Error::Validation(format!("Page {page} is out of range"))),
        }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of results before this page. Bounded by [`Pagination::new`].
    pub fn skip(&self) -> u64 {
        (self.page - 1)
            .checked_mul(self.page_size)
            .map_or(MAX_SKIP, |skip| skip.min(MAX_SKIP))
    }

    /// Wrap one page of items with the paging metadata.
    pub fn result<T>(self, items: Vec<T>, total: u64) -> Paginated<T> {
        Paginated {
            count: items.len() as u64,
            items,
            total,
            page: self.page,
            pages: (total + self.page_size - 1) / self.page_size,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let page = match req.query_value::<u64>("page").unwrap_or(Ok(1)) {
            Ok(page) => page,
            Err(_) => return invalid("The page must be a whole number"),
        };
        let page_size = match req
            .query_value::<u64>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        {
            Ok(page_size) => page_size,
            Err(_) => return invalid("The page size must be a whole number"),
        };
        match Self::new(page, page_size) {
            Ok(pagination) => Outcome::Success(pagination),
            Err(err) => Outcome::Failure((Status::BadRequest, err)),
        }
    }
}

fn invalid(message: &str) -> Outcome<Pagination, Error> {
    Outcome::Failure((Status::BadRequest, Error::Validation(message.to_string())))
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Number of items on this page.
    pub count: u64,
    /// Number of items across all pages.
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}
