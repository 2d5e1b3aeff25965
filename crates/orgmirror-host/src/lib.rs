pub mod github;

use async_trait::async_trait;
use orgmirror_core::config::MirrorConfig;
use orgmirror_core::error::MirrorError;
use orgmirror_core::models::repo::RepositoryDescriptor;

/// Trait for enumerating the repositories of an organization.
#[async_trait]
pub trait RepoLister: Send + Sync {
    /// List every repository of `organization`, following pagination to the end.
    async fn list_repos(&self, organization: &str) -> Result<Vec<RepositoryDescriptor>, MirrorError>;
}

/// Create the lister for a loaded configuration.
pub fn create_lister(config: &MirrorConfig) -> Result<Box<dyn RepoLister>, MirrorError> {
    Ok(Box::new(github::GitHubLister::new(
        config.api_url.clone(),
        config.access_token.expose(),
    )?))
}
