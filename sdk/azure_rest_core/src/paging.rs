//! `nextLink` paging.
//!
//! A list operation returns a [`Pager`]. Each pull on [`Pager::pages`]
//! performs at most one request: the first one from the operation's request
//! template, every later one against the `nextLink` of the previous page. The
//! sequence ends when a page has no `nextLink`. Calling `pages()` again starts
//! over from the first page.
//!
//! A relative `nextLink` is resolved against the URL the previous page was
//! fetched from. Links leaving the service endpoint are refused by the
//! authentication policy before anything is sent.

use crate::client::ServiceClient;
use crate::codec::JsonModel;
use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::{Context, Request};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::marker::PhantomData;
use url::Url;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in the order the service returned them.
    pub items: Vec<T>,
    /// Continuation for the next page; `None` on the last page.
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_link: Option<String>) -> Self {
        Self {
            items,
            next_link: next_link.filter(|link| !link.is_empty()),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_link.is_none()
    }
}

/// A response model that carries one page of items plus a continuation.
pub trait Continuable: JsonModel {
    type Item;

    fn into_page(self) -> Page<Self::Item>;
}

#[derive(Debug, Clone)]
enum Cursor {
    Start,
    Next { link: String, previous: Url },
    Done,
}

impl Cursor {
    fn after<T>(page: &Page<T>, previous: Url) -> Self {
        match &page.next_link {
            Some(link) => Self::Next {
                link: link.clone(),
                previous,
            },
            None => Self::Done,
        }
    }
}

/// Lazy, restartable sequence of pages decoded as `P`.
pub struct Pager<P> {
    client: ServiceClient,
    first: Request,
    ctx: Context,
    _model: PhantomData<fn() -> P>,
}

impl<P> Clone for Pager<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            first: self.first.clone(),
            ctx: self.ctx.clone(),
            _model: PhantomData,
        }
    }
}

impl<P> std::fmt::Debug for Pager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("model", &std::any::type_name::<P>())
            .field("first", &self.first.url().as_str())
            .finish()
    }
}

impl<P> Pager<P>
where
    P: Continuable + Send + 'static,
    P::Item: Send + 'static,
{
    pub(crate) fn new(client: ServiceClient, first: Request, ctx: Context) -> Self {
        Self {
            client,
            first,
            ctx,
            _model: PhantomData,
        }
    }

    /// Fetch the page `cursor` points at and the cursor that follows it.
    async fn fetch(&self, cursor: Cursor) -> Option<(ServiceResult<Page<P::Item>>, Cursor)> {
        let request = match cursor {
            Cursor::Start => self.first.clone(),
            Cursor::Next { link, previous } => {
                match self.client.continuation_request(&previous, &link) {
                    Ok(request) => request,
                    Err(e) => return Some((Err(e), Cursor::Done)),
                }
            }
            Cursor::Done => return None,
        };

        let fallback = request.url().clone();
        let response = match self.client.send(&self.ctx, request).await {
            Ok(response) => response,
            Err(e) => return Some((Err(e), Cursor::Done)),
        };
        let page = match response.read::<P>() {
            Ok(model) => model.into_page(),
            Err(e) => return Some((Err(e), Cursor::Done)),
        };

        tracing::debug!(
            items = page.items.len(),
            has_next = page.next_link.is_some(),
            "page fetched",
        );
        let previous = response.url().cloned().unwrap_or(fallback);
        let next = Cursor::after(&page, previous);
        Some((Ok(page), next))
    }

    /// Stream the pages, starting from the first one.
    ///
    /// The stream ends after the last page or after the first error.
    pub fn pages(&self) -> BoxStream<'_, ServiceResult<Page<P::Item>>> {
        stream::unfold(Cursor::Start, move |cursor| self.fetch(cursor)).boxed()
    }

    /// Stream individual items across all pages.
    pub fn items(&self) -> BoxStream<'_, ServiceResult<P::Item>> {
        self.pages()
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<_, ServiceError>)))
            .try_flatten()
            .boxed()
    }

    /// Collect every item of every page.
    pub async fn collect_items(&self) -> ServiceResult<Vec<P::Item>> {
        self.items().try_collect().await
    }

    /// Iterate the pages from synchronous code.
    pub fn blocking_pages(&self) -> BlockingPages<P> {
        BlockingPages {
            pager: self.clone(),
            cursor: Cursor::Start,
        }
    }
}

/// Blocking iterator over a [`Pager`]'s pages.
#[derive(Debug)]
pub struct BlockingPages<P> {
    pager: Pager<P>,
    cursor: Cursor,
}

impl<P> Iterator for BlockingPages<P>
where
    P: Continuable + Send + 'static,
    P::Item: Send + 'static,
{
    type Item = ServiceResult<Page<P::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = std::mem::replace(&mut self.cursor, Cursor::Done);
        if matches!(cursor, Cursor::Done) {
            return None;
        }

        let pager = &self.pager;
        let fetched = pager
            .client
            .block_on(async { Ok::<_, ServiceError>(pager.fetch(cursor).await) });

        match fetched {
            Ok(Some((result, next))) => {
                self.cursor = next;
                Some(result)
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKeyCredential, APIM_SUBSCRIPTION_KEY_HEADER};
    use crate::codec::read_json;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Listing {
        #[serde(rename = "widgets", default)]
        widgets: Vec<String>,
        #[serde(rename = "nextLink")]
        next_link: Option<String>,
    }

    impl JsonModel for Listing {
        const MODEL_NAME: &'static str = "Listing";

        fn read(json: &[u8]) -> ServiceResult<Self> {
            read_json(json)
        }
    }

    impl Continuable for Listing {
        type Item = String;

        fn into_page(self) -> Page<String> {
            Page::new(self.widgets, self.next_link)
        }
    }

    fn client(server: &MockServer) -> ServiceClient {
        ServiceClient::builder()
            .credential(ApiKeyCredential::new(server.uri(), "key").unwrap())
            .base_path("widgets/v1")
            .build()
            .expect("should build client")
    }

    async fn mount_three_pages(server: &MockServer) {
        // page 1 -> page 2 (empty, still continues) -> page 3 (terminal)
        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": [],
                "nextLink": format!("{}/widgets/v1/list?page=3", server.uri())
            })))
            .with_priority(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["d"],
                "nextLink": null
            })))
            .with_priority(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["a", "b", "c"],
                "nextLink": format!("{}/widgets/v1/list?page=2", server.uri())
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn empty_next_link_is_treated_as_absent() {
        let page: Page<u8> = Page::new(vec![], Some(String::new()));
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn pages_follow_next_link_and_surface_empty_pages() {
        let server = MockServer::start().await;
        mount_three_pages(&server).await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let pages: Vec<_> = pager.pages().try_collect().await.expect("all pages");

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].items, vec!["a", "b", "c"]);
        assert!(pages[1].items.is_empty());
        assert!(!pages[1].is_last());
        assert_eq!(pages[2].items, vec!["d"]);
        assert!(pages[2].is_last());
    }

    #[tokio::test]
    async fn items_flatten_in_server_order_and_restart_from_top() {
        let server = MockServer::start().await;
        mount_three_pages(&server).await;

        let client = client(&server);
        let first = client.request(reqwest::Method::GET, "/list").unwrap();
        let pager: Pager<Listing> = client.pager(&Context::new(), first);

        let once = pager.collect_items().await.unwrap();
        let twice = pager.collect_items().await.unwrap();

        assert_eq!(once, vec!["a", "b", "c", "d"]);
        assert_eq!(once, twice);
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn each_pull_issues_at_most_one_request() {
        let server = MockServer::start().await;
        mount_three_pages(&server).await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let mut pages = pager.pages();
        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.items.len(), 3);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn error_ends_the_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": {"code": "InternalServerError", "message": "boom"}
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let results: Vec<_> = pager.pages().collect().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap_err().status(), Some(500));
    }

    #[test]
    fn blocking_pages_match_async_pages() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            mount_three_pages(&server).await;
            server
        });

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let pages: Vec<_> = pager
            .blocking_pages()
            .collect::<ServiceResult<Vec<_>>>()
            .expect("all pages");

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].items, vec!["a", "b", "c"]);
        assert!(pages[1].items.is_empty());
        assert_eq!(pages[2].items, vec!["d"]);
    }

    /// Page 1 links with an absolute path, page 2 with a path-relative link.
    async fn mount_relative_links(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .and(query_param("page", "2"))
            .and(header(APIM_SUBSCRIPTION_KEY_HEADER, "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["c"],
                "nextLink": "list?page=3"
            })))
            .with_priority(1)
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .and(query_param("page", "3"))
            .and(header(APIM_SUBSCRIPTION_KEY_HEADER, "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["d"]
            })))
            .with_priority(1)
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["a", "b"],
                "nextLink": "/widgets/v1/list?page=2"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    /// The first page points at `foreign`, which must never be contacted.
    async fn mount_foreign_link(server: &MockServer, foreign: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["stolen"]
            })))
            .expect(0)
            .mount(foreign)
            .await;

        Mock::given(method("GET"))
            .and(path("/widgets/v1/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "widgets": ["a", "b"],
                "nextLink": format!("{}/widgets/v1/list?page=2", foreign.uri())
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn relative_next_links_resolve_against_the_previous_page() {
        let server = MockServer::start().await;
        mount_relative_links(&server).await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let pages: Vec<_> = pager.pages().try_collect().await.expect("all pages");

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].items, vec!["a", "b"]);
        assert_eq!(pages[1].items, vec!["c"]);
        assert_eq!(pages[2].items, vec!["d"]);
        server.verify().await;
    }

    #[tokio::test]
    async fn next_link_to_another_host_ends_with_an_error() {
        let server = MockServer::start().await;
        let foreign = MockServer::start().await;
        mount_foreign_link(&server, &foreign).await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let results: Vec<_> = pager.pages().collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().items, vec!["a", "b"]);
        assert!(matches!(
            results[1].as_ref().unwrap_err(),
            ServiceError::InvalidArgument(_)
        ));
        assert!(foreign.received_requests().await.unwrap().is_empty());
        foreign.verify().await;
    }

    #[test]
    fn blocking_pages_resolve_relative_next_links() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            mount_relative_links(&server).await;
            server
        });

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let items: Vec<String> = pager
            .blocking_pages()
            .collect::<ServiceResult<Vec<_>>>()
            .expect("all pages")
            .into_iter()
            .flat_map(|page| page.items)
            .collect();

        assert_eq!(items, vec!["a", "b", "c", "d"]);
        runtime.block_on(server.verify());
    }

    #[test]
    fn blocking_pages_refuse_next_link_to_another_host() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (server, foreign) = runtime.block_on(async {
            let server = MockServer::start().await;
            let foreign = MockServer::start().await;
            mount_foreign_link(&server, &foreign).await;
            (server, foreign)
        });

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());

        let mut pages = pager.blocking_pages();
        assert_eq!(pages.next().unwrap().unwrap().items, vec!["a", "b"]);
        let err = pages.next().unwrap().expect_err("foreign host");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
        assert!(pages.next().is_none());

        let received = runtime.block_on(foreign.received_requests()).unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn pager_used_from_blocking_code_can_be_dropped_in_async_code() {
        let server = MockServer::start().await;
        mount_three_pages(&server).await;

        let client = client(&server);
        let pager: Pager<Listing> =
            client.pager(&Context::new(), client.request(reqwest::Method::GET, "list").unwrap());
        drop(client);

        let pager = std::thread::spawn(move || {
            let pages = pager.blocking_pages().count();
            assert_eq!(pages, 3);
            pager
        })
        .join()
        .expect("blocking thread");

        drop(pager);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}
