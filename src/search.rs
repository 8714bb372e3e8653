use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::product::Product;
use crate::query::{COUNT, ParamValue, Parameters, START_INDEX};

/// Anything that can answer a catalogue `GetRecords` call.
///
/// `params` is fully serialized, including `startIndex` and `count`. No retry
/// is expected of implementations.
pub trait SearchTransport {
    fn get_records(&self, params: &Parameters) -> Result<FeatureCollection>;
}

impl<T: SearchTransport + ?Sized> SearchTransport for &T {
    fn get_records(&self, params: &Parameters) -> Result<FeatureCollection> {
        (**self).get_records(params)
    }
}

/// One decoded page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Value>,

    pub properties: CollectionProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionProperties {
    pub number_of_records_matched: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_records_returned: Option<u64>,

    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// A deferred catalogue query.
///
/// Nothing is fetched until [`Search::matched`], [`Search::products`] or
/// [`Search::pages`] is used.
#[derive(Debug)]
pub struct Search<T> {
    transport: T,
    params: Parameters,
    matched: OnceCell<u64>,
}

impl<T: SearchTransport> Search<T> {
    pub fn new(transport: T, params: Parameters) -> Self {
        Self {
            transport,
            params,
            matched: OnceCell::new(),
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn page_size(&self) -> u64 {
        self.params.page_size()
    }

    /// Number of products matching the query.
    ///
    /// The first successful call issues a single `count=0` request; later
    /// calls return the remembered value.
    pub fn matched(&self) -> Result<u64> {
        if let Some(n) = self.matched.get() {
            return Ok(*n);
        }

        self.params.ensure_executable()?;
        let page = self
            .transport
            .get_records(&self.params.merged([(COUNT, ParamValue::Int(0))]))?;
        let n = page.properties.number_of_records_matched;
        debug!(matched = n, "fetched match count");

        Ok(*self.matched.get_or_init(|| n))
    }

    /// Lazily iterate every matching product.
    ///
    /// Each call starts a new traversal from the first record. Pages are only
    /// requested once the previous page has been consumed.
    pub fn products(&self) -> Products<'_, T> {
        Products {
            pages: self.pages(),
            buffer: Vec::new().into_iter(),
        }
    }

    /// Lazily iterate result pages.
    pub fn pages(&self) -> Pages<'_, T> {
        Pages {
            search: self,
            page_size: self.page_size(),
            offset: 0,
            total: None,
            done: false,
        }
    }
}

/// Page-at-a-time traversal of a [`Search`].
///
/// The total reported by the first page bounds the traversal; an empty page
/// ends it early. The first page is always yielded, even when empty. After an
/// error the iterator is exhausted.
#[derive(Debug)]
pub struct Pages<'a, T> {
    search: &'a Search<T>,
    page_size: u64,
    offset: u64,
    total: Option<u64>,
    done: bool,
}

impl<T: SearchTransport> Pages<'_, T> {
    /// Records consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn fetch(&self) -> Result<FeatureCollection> {
        self.search.params.ensure_executable()?;

        // CSW startIndex is 1-based.
        let start_index = self.offset + 1;
        let params = self.search.params.merged([
            (START_INDEX, ParamValue::from(start_index)),
            (COUNT, ParamValue::from(self.page_size)),
        ]);
        self.search.transport.get_records(&params)
    }
}

impl<T: SearchTransport> Iterator for Pages<'_, T> {
    type Item = Result<FeatureCollection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(total) = self.total {
            if self.offset >= total {
                self.done = true;
                return None;
            }
        }

        let mut page = match self.fetch() {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let first_page = self.total.is_none();
        let total = *self
            .total
            .get_or_insert(page.properties.number_of_records_matched);

        let remaining = total.saturating_sub(self.offset);
        if page.features.len() as u64 > remaining {
            page.features.truncate(remaining as usize);
        }
        let returned = page.features.len() as u64;

        debug!(
            start_index = self.offset + 1,
            count = self.page_size,
            returned,
            matched = total,
            "fetched page"
        );

        if returned == 0 {
            if self.offset < total {
                warn!(
                    offset = self.offset,
                    matched = total,
                    "empty page before reaching match count; stopping"
                );
            }
            self.done = true;
            // The first page is still handed out so callers see its properties.
            return first_page.then_some(Ok(page));
        }

        self.offset += returned;
        if self.offset >= total {
            self.done = true;
        }

        Some(Ok(page))
    }
}

/// Record-at-a-time traversal of a [`Search`].
#[derive(Debug)]
pub struct Products<'a, T> {
    pages: Pages<'a, T>,
    buffer: std::vec::IntoIter<Value>,
}

impl<T: SearchTransport> Iterator for Products<'_, T> {
    type Item = Result<Product>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(feature) = self.buffer.next() {
                return Some(Ok(Product::new(feature)));
            }
            match self.pages.next()? {
                Ok(page) => self.buffer = page.features.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::query::SearchCriteria;

    /// In-memory catalogue holding `total` records named `R0..`.
    #[derive(Default)]
    struct FakeCatalogue {
        total: u64,
        /// Serve at most this many records per page.
        page_cap: Option<u64>,
        /// Serve empty pages from this offset on.
        empty_from: Option<u64>,
        /// Fail the page starting at this offset.
        fail_at: Option<u64>,
        /// Ignore `total` when filling pages.
        overfill: bool,
        /// Number of upcoming count requests that fail.
        count_failures: Cell<u32>,
        requests: RefCell<Vec<(u64, u64)>>,
    }

    impl FakeCatalogue {
        fn with_total(total: u64) -> Self {
            Self {
                total,
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<(u64, u64)> {
            self.requests.borrow().clone()
        }

        fn page_requests(&self) -> Vec<(u64, u64)> {
            self.requests().into_iter().filter(|(_, c)| *c > 0).collect()
        }
    }

    impl SearchTransport for FakeCatalogue {
        fn get_records(&self, params: &Parameters) -> Result<FeatureCollection> {
            let start_index = params.get("startIndex").and_then(ParamValue::as_u64).unwrap_or(1);
            let count = params.get("count").and_then(ParamValue::as_u64).unwrap_or(100);
            self.requests.borrow_mut().push((start_index, count));

            if count == 0 && self.count_failures.get() > 0 {
                self.count_failures.set(self.count_failures.get() - 1);
                return Err(Error::Decoding("truncated body".into()));
            }

            let offset = start_index - 1;
            if self.fail_at == Some(offset) {
                return Err(Error::Decoding("missing features".into()));
            }

            let mut n = count;
            if let Some(cap) = self.page_cap {
                n = n.min(cap);
            }
            if !self.overfill {
                n = n.min(self.total.saturating_sub(offset));
            }
            if self.empty_from.is_some_and(|e| offset >= e) {
                n = 0;
            }

            let features = (offset..offset + n)
                .map(|i| json!({"type": "Feature", "properties": {"identifier": format!("R{i}")}}))
                .collect();

            Ok(FeatureCollection {
                features,
                properties: CollectionProperties {
                    number_of_records_matched: self.total,
                    number_of_records_returned: Some(n),
                    additional_fields: Map::new(),
                },
            })
        }
    }

    fn params(page_size: u64) -> Parameters {
        SearchCriteria::new()
            .dataset_ids(["10002000"])
            .count(page_size)
            .build()
            .unwrap()
    }

    fn ids<T: SearchTransport>(search: &Search<T>) -> Vec<String> {
        search
            .products()
            .map(|p| p.unwrap().id().unwrap().to_string())
            .collect()
    }

    #[test]
    fn matched_is_memoized() {
        let catalogue = FakeCatalogue::with_total(150);
        let search = Search::new(&catalogue, params(100));

        assert_eq!(search.matched().unwrap(), 150);
        assert_eq!(search.matched().unwrap(), 150);
        assert_eq!(catalogue.requests(), vec![(1, 0)]);
    }

    #[test]
    fn failed_match_count_is_retried() {
        let catalogue = FakeCatalogue {
            count_failures: Cell::new(1),
            ..FakeCatalogue::with_total(150)
        };
        let search = Search::new(&catalogue, params(100));

        assert!(matches!(search.matched(), Err(Error::Decoding(_))));
        assert_eq!(catalogue.requests().len(), 1);

        assert_eq!(search.matched().unwrap(), 150);
        assert_eq!(catalogue.requests().len(), 2);

        assert_eq!(search.matched().unwrap(), 150);
        assert_eq!(catalogue.requests(), vec![(1, 0), (1, 0)]);
    }

    #[test]
    fn small_result_fits_one_page() {
        let catalogue = FakeCatalogue::with_total(8);
        let search = Search::new(&catalogue, params(100));

        assert_eq!(search.products().count(), 8);
        assert_eq!(catalogue.page_requests(), vec![(1, 100)]);
        assert_eq!(search.matched().unwrap(), 8);
    }

    #[test]
    fn walks_every_page() {
        let catalogue = FakeCatalogue::with_total(250);
        let search = Search::new(&catalogue, params(100));

        let sizes: Vec<usize> = search.pages().map(|p| p.unwrap().features.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(
            catalogue.page_requests(),
            vec![(1, 100), (101, 100), (201, 100)]
        );
    }

    #[test]
    fn yields_records_in_order_without_duplicates() {
        let catalogue = FakeCatalogue::with_total(25);
        let search = Search::new(&catalogue, params(10));

        let expected: Vec<String> = (0..25).map(|i| format!("R{i}")).collect();
        assert_eq!(ids(&search), expected);
        assert_eq!(catalogue.page_requests().len(), 3);
    }

    #[test]
    fn short_pages_advance_by_returned_count() {
        let catalogue = FakeCatalogue {
            page_cap: Some(30),
            ..FakeCatalogue::with_total(100)
        };
        let search = Search::new(&catalogue, params(50));

        assert_eq!(search.products().count(), 100);
        assert_eq!(
            catalogue.page_requests(),
            vec![(1, 50), (31, 50), (61, 50), (91, 50)]
        );
    }

    #[test]
    fn empty_page_ends_traversal_quietly() {
        let catalogue = FakeCatalogue {
            empty_from: Some(40),
            ..FakeCatalogue::with_total(100)
        };
        let search = Search::new(&catalogue, params(20));

        let products: Vec<_> = search.products().collect();
        assert_eq!(products.len(), 40);
        assert!(products.iter().all(|p| p.is_ok()));
        assert_eq!(catalogue.page_requests().len(), 3);
    }

    #[test]
    fn never_yields_more_than_total() {
        let catalogue = FakeCatalogue {
            overfill: true,
            ..FakeCatalogue::with_total(5)
        };
        let search = Search::new(&catalogue, params(10));

        assert_eq!(search.products().count(), 5);
        assert_eq!(catalogue.page_requests().len(), 1);
    }

    #[test]
    fn error_surfaces_at_failing_page_then_stops() {
        let catalogue = FakeCatalogue {
            fail_at: Some(20),
            ..FakeCatalogue::with_total(50)
        };
        let search = Search::new(&catalogue, params(10));

        let mut products = search.products();
        for _ in 0..20 {
            assert!(products.next().unwrap().is_ok());
        }
        assert!(matches!(products.next(), Some(Err(Error::Decoding(_)))));
        assert!(products.next().is_none());
        assert_eq!(catalogue.page_requests().len(), 3);
    }

    #[test]
    fn stopping_early_fetches_no_further_pages() {
        let catalogue = FakeCatalogue::with_total(100);
        let search = Search::new(&catalogue, params(10));

        let first: Vec<_> = search.products().take(10).collect();
        assert_eq!(first.len(), 10);
        assert_eq!(catalogue.page_requests(), vec![(1, 10)]);
    }

    #[test]
    fn each_traversal_starts_over() {
        let catalogue = FakeCatalogue::with_total(30);
        let search = Search::new(&catalogue, params(20));

        assert_eq!(ids(&search), ids(&search));
        assert_eq!(
            catalogue.page_requests(),
            vec![(1, 20), (21, 20), (1, 20), (21, 20)]
        );
    }

    #[test]
    fn no_records_means_one_request() {
        let catalogue = FakeCatalogue::with_total(0);
        let search = Search::new(&catalogue, params(100));

        assert_eq!(search.products().count(), 0);
        assert_eq!(catalogue.page_requests().len(), 1);
    }

    #[test]
    fn empty_first_page_is_still_yielded() {
        let catalogue = FakeCatalogue::with_total(0);
        let search = Search::new(&catalogue, params(100));

        let pages: Vec<_> = search.pages().collect::<Result<_>>().unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].features.is_empty());
        assert_eq!(pages[0].properties.number_of_records_matched, 0);
        assert_eq!(catalogue.page_requests(), vec![(1, 100)]);
    }

    #[test]
    fn empty_later_page_is_not_yielded() {
        let catalogue = FakeCatalogue {
            empty_from: Some(10),
            ..FakeCatalogue::with_total(30)
        };
        let search = Search::new(&catalogue, params(10));

        let sizes: Vec<usize> = search.pages().map(|p| p.unwrap().features.len()).collect();
        assert_eq!(sizes, vec![10]);
        assert_eq!(catalogue.page_requests().len(), 2);
    }

    #[test]
    fn missing_dataset_fails_before_any_request() {
        let catalogue = FakeCatalogue::with_total(10);
        let search = Search::new(&catalogue, SearchCriteria::new().build().unwrap());

        assert!(matches!(search.matched(), Err(Error::InvalidQuery(_))));
        let mut products = search.products();
        assert!(matches!(products.next(), Some(Err(Error::InvalidQuery(_)))));
        assert!(products.next().is_none());
        assert!(catalogue.requests().is_empty());
    }

    #[test]
    fn decodes_feature_collection() {
        let page: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "properties": {"numberOfRecordsMatched": 4, "numberOfRecordsReturned": 2},
            "features": [{}, {}],
        }))
        .unwrap();
        assert_eq!(page.properties.number_of_records_matched, 4);
        assert_eq!(page.features.len(), 2);

        let count_only: FeatureCollection = serde_json::from_value(json!({
            "properties": {"numberOfRecordsMatched": 150},
        }))
        .unwrap();
        assert!(count_only.features.is_empty());
    }
}
