use async_trait::async_trait;
use cadastro_core::{AppConfig, Candidate, LookupError, PersonLookup};
use reqwest::Url;

use crate::error::{Result, SourceError};
use crate::http::JsonClient;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Whether the query is forwarded to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryFilter {
    /// `GET /pessoas?nome_like=<query>`; an empty query fetches everything.
    #[default]
    ServerSide,
    /// Always `GET /pessoas`.
    Unfiltered,
}

/// The `/pessoas` endpoint as a person lookup.
pub struct PessoasSource {
    client: JsonClient,
    base_url: String,
    filter: QueryFilter,
}

impl PessoasSource {
    pub fn new(base_url: impl Into<String>, filter: QueryFilter) -> Result<Self> {
        Self::with_client(
            base_url,
            filter,
            JsonClient::new(0, concat!("cadastro/", env!("CARGO_PKG_VERSION")))?,
        )
    }

    pub fn with_client(
        base_url: impl Into<String>,
        filter: QueryFilter,
        client: JsonClient,
    ) -> Result<Self> {
        let base_url = base_url.into();
        parse_base_url(&base_url)?;
        Ok(Self {
            client,
            base_url,
            filter,
        })
    }

    /// Build from the `[lookup]` config section; `filter` follows the search mode.
    pub fn from_config(config: &AppConfig, filter: QueryFilter) -> Result<Self> {
        let client = JsonClient::new(config.lookup.max_retries, &config.lookup.user_agent)?;
        Self::with_client(config.lookup.base_url.clone(), filter, client)
    }

    pub fn filter(&self) -> QueryFilter {
        self.filter
    }

    pub fn url_for(&self, query: &str) -> Result<Url> {
        let mut url = parse_base_url(&self.base_url)?;
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                SourceError::InvalidUrl(self.base_url.clone(), "cannot be a base".to_string())
            })?;
            segs.pop_if_empty().push("pessoas");
        }
        if self.filter == QueryFilter::ServerSide && !query.is_empty() {
            url.query_pairs_mut().append_pair("nome_like", query);
        }
        Ok(url)
    }

    pub async fn fetch(&self, query: &str) -> Result<Vec<Candidate>> {
        let url = self.url_for(query)?;
        tracing::debug!(%url, "fetching pessoas");
        self.client.get_json(url.as_str()).await
    }
}

#[async_trait]
impl PersonLookup for PessoasSource {
    async fn search(&self, query: &str) -> std::result::Result<Vec<Candidate>, LookupError> {
        self.fetch(query).await.map_err(LookupError::from)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| SourceError::InvalidUrl(base_url.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    const BODY: &str = r#"[{"id": 1, "nome": "Ana"}, {"id": 2, "nome": "Anabela"}]"#;

    #[test]
    fn url_shapes() {
        let filtered = PessoasSource::new("http://localhost:5000", QueryFilter::ServerSide).unwrap();
        assert_eq!(
            filtered.url_for("Ana Maria").unwrap().as_str(),
            "http://localhost:5000/pessoas?nome_like=Ana+Maria"
        );
        assert_eq!(
            filtered.url_for("").unwrap().as_str(),
            "http://localhost:5000/pessoas"
        );

        let unfiltered = PessoasSource::new("http://localhost:5000/api/", QueryFilter::Unfiltered).unwrap();
        assert_eq!(
            unfiltered.url_for("Ana").unwrap().as_str(),
            "http://localhost:5000/api/pessoas"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(matches!(
            PessoasSource::new("not a url", QueryFilter::ServerSide),
            Err(SourceError::InvalidUrl(_, _))
        ));
    }

    #[tokio::test]
    async fn test_search_filters_server_side() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pessoas")
            .match_query(Matcher::UrlEncoded("nome_like".into(), "Ana".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let source = PessoasSource::new(server.url(), QueryFilter::ServerSide).unwrap();
        let people = source.search("Ana").await.unwrap();

        assert_eq!(people, vec![Candidate::new(1, "Ana"), Candidate::new(2, "Anabela")]);
    }

    #[tokio::test]
    async fn test_unfiltered_source_fetches_full_list() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/pessoas")
            .match_query(Matcher::Missing)
            .with_status(200)
            .with_body(BODY)
            .expect(1)
            .create_async()
            .await;

        let source = PessoasSource::new(server.url(), QueryFilter::Unfiltered).unwrap();
        let people = source.search("whatever").await.unwrap();

        assert_eq!(people.len(), 2);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_maps_to_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pessoas")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let source = PessoasSource::new(server.url(), QueryFilter::ServerSide).unwrap();
        let err = source.search("Ana").await.unwrap_err();

        assert_eq!(err, LookupError::Status(503, "unavailable".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_parse() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/pessoas")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"id": 1}"#)
            .create_async()
            .await;

        let source = PessoasSource::new(server.url(), QueryFilter::ServerSide).unwrap();
        let err = source.search("Ana").await.unwrap_err();

        assert!(matches!(err, LookupError::Parse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_transport() {
        // Nothing listens on port 9 locally.
        let source = PessoasSource::new("http://127.0.0.1:9", QueryFilter::ServerSide).unwrap();
        let err = source.search("Ana").await.unwrap_err();

        assert!(matches!(err, LookupError::Transport(_)), "{err:?}");
    }
}
