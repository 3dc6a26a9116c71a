use crate::api::{filter_payload, FilterResponse, Transport};
use crate::config::ApiConfig;
use crate::debug_eprintln;
use crate::error::{CarsError, Result};
use crate::models::{Listing, ResolvedIdentifiers};

#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub page: u32,
    pub page_count: u32,
    pub listings: Vec<Listing>,
}

pub struct ListingFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    api: &'a ApiConfig,
}

impl<'a, T: Transport + ?Sized> ListingFetcher<'a, T> {
    pub fn new(transport: &'a T, api: &'a ApiConfig) -> Self {
        Self { transport, api }
    }

    /// Lazily walks the result pages, starting at page 1. Every call hits the network again.
    pub fn pages(&self, ids: &ResolvedIdentifiers) -> ListingPages<'a, T> {
        ListingPages {
            transport: self.transport,
            url: self.api.filter_url(),
            ids: ids.clone(),
            next_page: 1,
            page_limit: None,
            finished: false,
        }
    }

    pub fn fetch(&self, ids: &ResolvedIdentifiers) -> Result<Vec<Listing>> {
        self.fetch_with_progress(ids, |_| {})
    }

    /// Collects every page; the first failing page discards what was gathered so far.
    pub fn fetch_with_progress<F>(&self, ids: &ResolvedIdentifiers, mut on_page: F) -> Result<Vec<Listing>>
    where
        F: FnMut(&ListingPage),
    {
        let mut listings = Vec::new();
        for page in self.pages(ids) {
            let page = page?;
            on_page(&page);
            listings.extend(page.listings);
        }
        Ok(listings)
    }
}

/// Iterator over listing pages. The page count announced by the first page bounds the walk.
pub struct ListingPages<'a, T: Transport + ?Sized> {
    transport: &'a T,
    url: String,
    ids: ResolvedIdentifiers,
    next_page: u32,
    page_limit: Option<u32>,
    finished: bool,
}

impl<'a, T: Transport + ?Sized> ListingPages<'a, T> {
    fn request(&self, page: u32) -> Result<FilterResponse> {
        let reply = self.transport.post_json(&self.url, &filter_payload(page, &self.ids))?;
        if !reply.is_success() {
            return Err(CarsError::RequestFailed {
                status: reply.status,
                reason: reply.reason,
            });
        }
        Ok(serde_json::from_str(&reply.body)?)
    }
}

impl<'a, T: Transport + ?Sized> Iterator for ListingPages<'a, T> {
    type Item = Result<ListingPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if matches!(self.page_limit, Some(limit) if self.next_page > limit) {
            self.finished = true;
            return None;
        }

        let page = self.next_page;
        let response = match self.request(page) {
            Ok(response) => response,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        let limit = *self.page_limit.get_or_insert(response.page_count);
        debug_eprintln!("Page {}/{}", page, response.page_count);
        if limit == 0 {
            self.finished = true;
            return None;
        }

        self.next_page += 1;
        Some(Ok(ListingPage {
            page,
            page_count: limit,
            listings: response.adverts.into_iter().map(|advert| advert.into_listing()).collect(),
        }))
    }
}
