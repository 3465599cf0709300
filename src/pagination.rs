use axum::http::Uri;

use crate::{errors::RequestError, Paginated};

const PAGE_PARAM: &str = "page";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    /// Parses the `page` query value. Missing means the first page.
    pub fn new(page: Option<&str>, page_size: i64) -> Result<Self, RequestError> {
        let page = match page.map(str::trim) {
            None | Some("") => 1,
            Some(value) => match value.parse::<i64>() {
                Ok(page) if page >= 1 => page,
                _ => return Err(RequestError::InvalidPage),
            },
        };
        Ok(Self {
            page,
            page_size: page_size.max(1),
        })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// The first page always exists, even with nothing in it.
    pub fn num_pages(&self, count: i64) -> i64 {
        (count / self.page_size + i64::from(count % self.page_size != 0)).max(1)
    }

    pub fn check(&self, count: i64) -> Result<(), RequestError> {
        if self.page > self.num_pages(count) {
            return Err(RequestError::InvalidPage);
        }
        Ok(())
    }

    pub fn wrap<T>(&self, uri: &Uri, count: i64, results: Vec<T>) -> Paginated<T> {
        let next = (self.page < self.num_pages(count)).then(|| page_link(uri, self.page + 1));
        let previous = (self.page > 1).then(|| page_link(uri, self.page - 1));
        Paginated {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Rewrites the request URI with `page` replaced; page one drops the parameter.
fn page_link(uri: &Uri, page: i64) -> String {
    let pairs = url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .filter(|(key, _)| *key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<Vec<_>>();
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.extend_pairs(pairs);
    if page > 1 {
        query.append_pair(PAGE_PARAM, &page.to_string());
    }
    let query = query.finish();
    if query.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{}", uri.path(), query)
    }
}
