use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};

use crate::data::schedule::db::ScheduleQuery;

pub const DEFAULT_PAGE_LENGTH: u32 = 20;

/// Optional `page`/`len` query parameters (short forms `p`/`l`).
///
/// Without either parameter listings are returned whole.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct PageState {
    pub page_length: Option<u32>,
    pub page: u32,
}

impl PageState {
    pub fn skip(&self) -> u64 {
        self.page_length
            .map_or(0, |len| u64::from(len) * u64::from(self.page))
    }

    pub fn limit(&self) -> Option<u32> {
        self.page_length
    }

    pub fn apply(&self, query: ScheduleQuery) -> ScheduleQuery {
        ScheduleQuery {
            skip: self.skip(),
            limit: self.limit(),
            ..query
        }
    }
}

fn query_u32(request: &Request<'_>, long: &str, short: &str) -> Option<u32> {
    request
        .query_value(long)
        .and_then(|it| it.ok())
        .or_else(|| request.query_value(short).and_then(|it| it.ok()))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PageState {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let length = query_u32(request, "len", "l").filter(|it| *it > 0);
        let page = query_u32(request, "page", "p");

        Outcome::Success(match (length, page) {
            (None, None) => PageState::default(),
            (length, page) => PageState {
                page_length: Some(length.unwrap_or(DEFAULT_PAGE_LENGTH)),
                page: page.unwrap_or(0),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaged_listing_has_no_limit() {
        let query = PageState::default().apply(ScheduleQuery::default());
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, None);
    }

    #[test]
    fn page_skips_whole_pages() {
        let page = PageState {
            page_length: Some(15),
            page: 2,
        };
        let query = page.apply(ScheduleQuery::default());
        assert_eq!(query.skip, 30);
        assert_eq!(query.limit, Some(15));
    }
}
