use crate::client::{ApiResult, SportmonksApi};
use crate::normalize::normalize_fixture;
use crate::{FixtureQuery, FixtureRow, RawFixture};
use log::debug;
use serde_json::{Map, Value};

/// Pagination metadata of one page, flattened across API generations.
///
/// v3 puts it under `pagination`, v2 under `meta.pagination`, API-Football
/// under `paging` (`current`/`total`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: Option<u32>,
    /// Explicit next page index, when the API states one.
    pub next_page: Option<u32>,
    pub has_next_link: bool,
    pub total_pages: Option<u32>,
    pub has_more: bool,
}

impl Pagination {
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        if let Some(block) = payload.get("pagination").and_then(non_empty_object) {
            return Self::from_block(block);
        }
        if let Some(block) = payload
            .get("meta")
            .and_then(|meta| meta.get("pagination"))
            .and_then(non_empty_object)
        {
            return Self::from_block(block);
        }
        if let Some(paging) = payload.get("paging").and_then(non_empty_object) {
            return Self {
                current_page: paging.get("current").and_then(page_number),
                total_pages: paging.get("total").and_then(page_number),
                ..Self::default()
            };
        }
        Self::default()
    }

    fn from_block(block: &Map<String, Value>) -> Self {
        let next = ["next_page", "next"]
            .iter()
            .find_map(|key| block.get(*key).filter(|v| truthy(v)));
        let total = ["total_pages", "last_page"]
            .iter()
            .find_map(|key| block.get(*key).filter(|v| truthy(v)));

        Self {
            current_page: block.get("current_page").and_then(page_number),
            next_page: next.and_then(page_number),
            has_next_link: block
                .get("links")
                .and_then(|links| links.get("next"))
                .is_some_and(truthy),
            total_pages: total.and_then(page_number),
            has_more: block.get("has_more").is_some_and(truthy),
        }
    }

    /// Next page index implied by the metadata alone, in priority order: an
    /// explicit index, a `next` link, `current < total`, a `has_more` flag.
    pub fn next_index(&self) -> Option<u32> {
        self.next_page.or_else(|| self.inferred_next())
    }

    fn inferred_next(&self) -> Option<u32> {
        let current = self.current_page?;
        let advance = self.has_next_link
            || self.total_pages.is_some_and(|total| current < total)
            || self.has_more;
        if advance { current.checked_add(1) } else { None }
    }
}

/// Page to request after `page`, or `None` when the traversal is over.
///
/// Each metadata signal is only taken when it moves past `page`, so pages stay
/// strictly ascending: a stale explicit index defers to the inferred signals.
/// Without a usable signal, only a full page implies another one.
pub fn next_page_after(page: u32, fetched: usize, per_page: u32, pagination: &Pagination) -> Option<u32> {
    let advances = |next: &u32| *next > page;
    if let Some(next) = pagination.next_page {
        if advances(&next) {
            return Some(next);
        }
        debug!("ignoring non-advancing next page {next} after page {page}");
    }
    if let Some(next) = pagination.inferred_next().filter(advances) {
        return Some(next);
    }
    if fetched == per_page as usize {
        return page.checked_add(1);
    }
    None
}

/// One page of raw fixtures with its pagination metadata.
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub fixtures: Vec<RawFixture>,
    pub pagination: Pagination,
}

impl FixturePage {
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let pagination = Pagination::from_payload(&payload);
        let fixtures = records(payload).into_iter().map(RawFixture::new).collect();
        Self { fixtures, pagination }
    }
}

/// Records of a list response: `data` for SportMonks, `response` for API-Football.
pub(crate) fn records(mut payload: Map<String, Value>) -> Vec<Value> {
    for key in ["data", "response"] {
        if let Some(Value::Array(list)) = payload.remove(key)
            && !list.is_empty()
        {
            return list;
        }
    }
    Vec::new()
}

/// Lazy walk over every raw fixture matching a query, one request per page.
///
/// A transport error is yielded once and ends the sequence.
#[derive(Debug)]
pub struct RawFixtures<'a> {
    api: &'a SportmonksApi,
    query: FixtureQuery,
    next_page: Option<u32>,
    pages_fetched: u32,
    buffer: std::vec::IntoIter<RawFixture>,
}

impl<'a> RawFixtures<'a> {
    pub(crate) fn new(api: &'a SportmonksApi, query: FixtureQuery) -> Self {
        let start = query.start_page.max(1);
        Self { api, query, next_page: Some(start), pages_fetched: 0, buffer: Vec::new().into_iter() }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn ceiling_reached(&self) -> bool {
        self.query.max_pages.is_some_and(|max| self.pages_fetched >= max)
    }
}

impl Iterator for RawFixtures<'_> {
    type Item = ApiResult<RawFixture>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(fixture) = self.buffer.next() {
                return Some(Ok(fixture));
            }
            if self.ceiling_reached() {
                return None;
            }
            let page = self.next_page.take()?;
            let FixturePage { fixtures, pagination } =
                match self.api.get_fixtures_page(&self.query, page) {
                    Ok(fetched) => fetched,
                    Err(e) => return Some(Err(e)),
                };
            if fixtures.is_empty() {
                debug!("page {page} is empty, traversal complete");
                return None;
            }

            self.pages_fetched += 1;
            debug!("page {page}: {} fixtures", fixtures.len());
            self.next_page = next_page_after(page, fixtures.len(), self.query.per_page, &pagination);
            self.buffer = fixtures.into_iter();
        }
    }
}

/// Normalized rows over a [`RawFixtures`] walk; unusable fixtures are skipped.
#[derive(Debug)]
pub struct FixtureRows<'a> {
    inner: RawFixtures<'a>,
    rejected: usize,
}

impl<'a> FixtureRows<'a> {
    pub(crate) fn new(inner: RawFixtures<'a>) -> Self {
        Self { inner, rejected: 0 }
    }

    /// Fixtures skipped so far because their teams could not be identified.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn pages_fetched(&self) -> u32 {
        self.inner.pages_fetched()
    }
}

impl Iterator for FixtureRows<'_> {
    type Item = ApiResult<FixtureRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(raw) => match normalize_fixture(&raw) {
                    Some(row) => return Some(Ok(row)),
                    None => self.rejected += 1,
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn non_empty_object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object().filter(|o| !o.is_empty())
}

fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiConfig;
    use crate::retry::RecordingSleeper;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;

    fn meta(value: Value) -> Pagination {
        match value {
            Value::Object(map) => Pagination::from_payload(&map),
            _ => unreachable!(),
        }
    }

    fn api_for(server: &Server) -> SportmonksApi {
        let config = ApiConfig {
            base_url: server.url(),
            api_token: Some("secret".into()),
            ..ApiConfig::default()
        };
        SportmonksApi::new(config).with_sleeper(Arc::new(RecordingSleeper::default()))
    }

    fn fixtures_body(names: &[(&str, &str)], pagination: Value) -> String {
        let data: Vec<Value> = names
            .iter()
            .map(|(home, away)| json!({"participants": [{"name": home}, {"name": away}]}))
            .collect();
        json!({"data": data, "pagination": pagination}).to_string()
    }

    fn page_mock(server: &mut Server, page: &str, body: String) -> mockito::Mock {
        server
            .mock("GET", "/fixtures")
            .match_query(Matcher::UrlEncoded("page".into(), page.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    #[test]
    fn explicit_next_page_wins() {
        let p = meta(json!({"pagination": {"next_page": "4", "current_page": 1, "has_more": true}}));
        assert_eq!(p.next_index(), Some(4));
        let p = meta(json!({"pagination": {"next": 7}}));
        assert_eq!(p.next_index(), Some(7));
    }

    #[test]
    fn next_link_total_and_has_more_advance_by_one() {
        let p = meta(json!({"meta": {"pagination": {"current_page": 2, "links": {"next": "https://x/?page=3"}}}}));
        assert_eq!(p.next_index(), Some(3));
        let p = meta(json!({"pagination": {"current_page": 2, "total_pages": 5}}));
        assert_eq!(p.next_index(), Some(3));
        let p = meta(json!({"pagination": {"current_page": 5, "last_page": 5}}));
        assert_eq!(p.next_index(), None);
        let p = meta(json!({"pagination": {"current_page": 1, "has_more": true}}));
        assert_eq!(p.next_index(), Some(2));
    }

    #[test]
    fn v3_url_next_page_falls_through_to_has_more() {
        let p = meta(json!({"pagination": {
            "count": 25,
            "per_page": 25,
            "current_page": 1,
            "next_page": "https://api.sportmonks.com/v3/football/fixtures?page=2",
            "has_more": true
        }}));
        assert_eq!(p.next_page, None);
        assert_eq!(p.next_index(), Some(2));
    }

    #[test]
    fn api_football_paging_block() {
        let p = meta(json!({"paging": {"current": 1, "total": 3}}));
        assert_eq!(p.next_index(), Some(2));
    }

    #[test]
    fn next_index_needs_current_page_for_inference() {
        let p = meta(json!({"pagination": {"has_more": true, "total_pages": 9}}));
        assert_eq!(p.next_index(), None);
        assert_eq!(meta(json!({})).next_index(), None);
    }

    #[test]
    fn short_page_without_metadata_stops() {
        assert_eq!(next_page_after(1, 3, 50, &Pagination::default()), None);
        assert_eq!(next_page_after(1, 50, 50, &Pagination::default()), Some(2));
    }

    #[test]
    fn non_advancing_metadata_falls_back_to_page_size() {
        let stale = Pagination { next_page: Some(1), ..Default::default() };
        assert_eq!(next_page_after(1, 10, 10, &stale), Some(2));
        assert_eq!(next_page_after(3, 4, 10, &stale), None);

        let stale_current = Pagination { current_page: Some(1), has_more: true, ..Default::default() };
        assert_eq!(next_page_after(3, 10, 10, &stale_current), Some(4));
        assert_eq!(next_page_after(3, 4, 10, &stale_current), None);
    }

    #[test]
    fn stale_explicit_index_defers_to_has_more() {
        let p = Pagination {
            current_page: Some(1),
            next_page: Some(1),
            has_more: true,
            ..Default::default()
        };
        assert_eq!(next_page_after(1, 3, 50, &p), Some(2));

        let p = Pagination {
            current_page: Some(2),
            next_page: Some(2),
            total_pages: Some(4),
            ..Default::default()
        };
        assert_eq!(next_page_after(2, 1, 50, &p), Some(3));
    }

    #[test]
    fn last_representable_page_ends_the_walk() {
        assert_eq!(next_page_after(u32::MAX, 1, 1, &Pagination::default()), None);

        let p = Pagination { current_page: Some(u32::MAX), has_more: true, ..Default::default() };
        assert_eq!(p.next_index(), None);
        assert_eq!(next_page_after(u32::MAX, 1, 1, &p), None);
    }

    #[test]
    fn contradictory_metadata_trusts_the_explicit_index() {
        let p = Pagination {
            current_page: Some(2),
            next_page: Some(6),
            total_pages: Some(2),
            ..Default::default()
        };
        assert_eq!(next_page_after(2, 1, 50, &p), Some(6));
    }

    #[test]
    fn records_fall_back_to_response() {
        let payload = json!({"data": [], "response": [{"id": 1}]});
        let Value::Object(map) = payload else { unreachable!() };
        assert_eq!(records(map), vec![json!({"id": 1})]);
    }

    #[test]
    fn walks_pages_in_order_until_short_page() {
        let mut server = Server::new();
        let first = page_mock(&mut server, "1", fixtures_body(&[("A", "B"), ("C", "D")], json!({}))).create();
        let second = page_mock(&mut server, "2", fixtures_body(&[("E", "F")], json!({}))).create();
        let api = api_for(&server);

        let query = FixtureQuery { per_page: 2, ..Default::default() };
        let homes: Vec<String> = api
            .fixture_rows(query)
            .map(|row| row.unwrap().home_team)
            .collect();

        assert_eq!(homes, vec!["A", "C", "E"]);
        first.assert();
        second.assert();
    }

    #[test]
    fn short_page_is_the_last_request() {
        let mut server = Server::new();
        let only = page_mock(&mut server, "1", fixtures_body(&[("A", "B")], json!({}))).create();
        let never = page_mock(&mut server, "2", fixtures_body(&[("C", "D")], json!({}))).expect(0).create();
        let api = api_for(&server);

        let query = FixtureQuery { per_page: 50, ..Default::default() };
        let rows = api.fetch_fixture_rows(query).unwrap();

        assert_eq!(rows.len(), 1);
        only.assert();
        never.assert();
    }

    #[test]
    fn follows_metadata_and_stops_on_empty_page() {
        let mut server = Server::new();
        page_mock(&mut server, "1", fixtures_body(&[("A", "B")], json!({"current_page": 1, "next_page": 3}))).create();
        let skipped = page_mock(&mut server, "2", fixtures_body(&[("X", "Y")], json!({}))).expect(0).create();
        page_mock(&mut server, "3", fixtures_body(&[("C", "D")], json!({"current_page": 3, "has_more": true}))).create();
        page_mock(&mut server, "4", json!({"data": []}).to_string()).create();
        let api = api_for(&server);

        let rows = api.fetch_fixture_rows(FixtureQuery { per_page: 10, ..Default::default() }).unwrap();

        let homes: Vec<_> = rows.iter().map(|r| r.home_team.as_str()).collect();
        assert_eq!(homes, vec!["A", "C"]);
        skipped.assert();
    }

    #[test]
    fn max_pages_bounds_an_endless_upstream() {
        let mut server = Server::new();
        let endless = server
            .mock("GET", "/fixtures")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(fixtures_body(&[("A", "B")], json!({"current_page": 1, "has_more": true})))
            .expect(3)
            .create();
        let api = api_for(&server);

        let query = FixtureQuery { per_page: 1, max_pages: Some(3), ..Default::default() };
        let mut rows = api.fixture_rows(query);
        assert_eq!(rows.by_ref().count(), 3);
        assert_eq!(rows.pages_fetched(), 3);
        endless.assert();
    }

    #[test]
    fn zero_page_ceiling_fetches_nothing() {
        let mut server = Server::new();
        let never = server.mock("GET", "/fixtures").match_query(Matcher::Any).expect(0).create();
        let api = api_for(&server);

        let query = FixtureQuery { max_pages: Some(0), ..Default::default() };
        assert_eq!(api.fixtures(query).count(), 0);
        never.assert();
    }

    #[test]
    fn resumes_from_start_page() {
        let mut server = Server::new();
        let resumed = page_mock(&mut server, "5", fixtures_body(&[("A", "B")], json!({}))).create();
        let api = api_for(&server);

        let query = FixtureQuery { start_page: 5, ..Default::default() };
        assert_eq!(api.fetch_fixture_rows(query).unwrap().len(), 1);
        resumed.assert();
    }

    #[test]
    fn rejected_fixtures_are_counted_not_yielded() {
        let mut server = Server::new();
        let body = json!({"data": [
            {"id": 1, "participants": [{"name": "A"}, {"name": "B"}]},
            {"id": 2},
            {"id": 3, "home_name": "C", "away_name": "D"}
        ]})
        .to_string();
        page_mock(&mut server, "1", body).create();
        let api = api_for(&server);

        let mut rows = api.fixture_rows(FixtureQuery::default());
        let collected: Vec<_> = rows.by_ref().map(Result::unwrap).collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(rows.rejected(), 1);
    }

    #[test]
    fn error_is_yielded_once_then_the_walk_ends() {
        let mut server = Server::new();
        page_mock(&mut server, "1", fixtures_body(&[("A", "B")], json!({"current_page": 1, "has_more": true}))).create();
        server
            .mock("GET", "/fixtures")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(403)
            .with_body("forbidden")
            .create();
        let api = api_for(&server);

        let mut walk = api.fixtures(FixtureQuery::default());
        assert!(walk.next().unwrap().is_ok());
        assert!(walk.next().unwrap().is_err());
        assert!(walk.next().is_none());
    }
}
