use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use url::Url;

use orgmirror_core::error::MirrorError;
use orgmirror_core::models::repo::RepositoryDescriptor;

use crate::RepoLister;

const PER_PAGE: u32 = 100;

/// Upper bound on followed `Link` pages, in case a server keeps pointing at itself.
const MAX_PAGES: usize = 1000;

pub struct GitHubLister {
    client: reqwest::Client,
    api_url: Url,
}

impl GitHubLister {
    pub fn new(api_url: Url, token: &str) -> Result<Self, MirrorError> {
        Self::with_builder(api_url, token, reqwest::Client::builder())
    }

    fn with_builder(
        api_url: Url,
        token: &str,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| MirrorError::config("access token contains invalid header characters"))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(concat!("orgmirror/", env!("CARGO_PKG_VERSION"))),
        );

        let client = builder
            .default_headers(headers)
            .build()
            .map_err(|e| MirrorError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_url })
    }

    /// `{api}/orgs/{org}/repos?per_page=100`, keeping any base path (GitHub Enterprise).
    fn org_repos_url(&self, organization: &str) -> Result<Url, MirrorError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| MirrorError::config(format!("invalid API URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["orgs", organization, "repos"]);
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string());
        Ok(url)
    }

    async fn get_page(
        &self,
        url: &str,
    ) -> Result<(Vec<RepositoryDescriptor>, Option<String>), MirrorError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MirrorError::ListingFailed {
                status: 0,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(MirrorError::ListingFailed {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let next = resp
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let items: Vec<RepositoryDescriptor> =
            resp.json().await.map_err(|e| MirrorError::ListingFailed {
                status: 0,
                message: format!("JSON parse error: {e}"),
            })?;

        Ok((items, next))
    }
}

impl GitHubLister {
    /// Pagination links carry the bearer token along, so they must point back
    /// at the configured API origin.
    fn same_origin(&self, link: &str) -> Result<String, MirrorError> {
        let target = Url::parse(link).map_err(|e| MirrorError::ListingFailed {
            status: 0,
            message: format!("invalid pagination link '{link}': {e}"),
        })?;
        if target.origin() != self.api_url.origin() {
            return Err(MirrorError::ListingFailed {
                status: 0,
                message: format!(
                    "pagination link points at {}, expected {}",
                    target.origin().ascii_serialization(),
                    self.api_url.origin().ascii_serialization()
                ),
            });
        }
        Ok(target.into())
    }
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                .unwrap_or(false)
        });
        is_next.then(|| target.to_string())
    })
}

#[async_trait]
impl RepoLister for GitHubLister {
    async fn list_repos(&self, organization: &str) -> Result<Vec<RepositoryDescriptor>, MirrorError> {
        let mut all = Vec::new();
        let mut next = Some(self.org_repos_url(organization)?.to_string());
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                tracing::warn!(pages, "stopping pagination at page limit");
                break;
            }
            pages += 1;

            let (items, following) = self.get_page(&url).await?;
            tracing::debug!(page = pages, count = items.len(), "fetched repository page");
            all.extend(items);
            next = following.map(|link| self.same_origin(&link)).transpose()?;
        }

        Ok(all)
    }
}
