use serde::Deserialize;

/// A repository as listed by the organization API.
///
/// Rebuilt from the listing every cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub clone_url: String,
    #[serde(default)]
    pub archived: bool,
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
            archived: false,
        }
    }
}

/// A transfer source: the plain URL that is safe to log and store, plus the
/// URL carrying credentials that is only ever handed to `git`.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferUrl {
    pub plain: String,
    pub authenticated: String,
}

impl TransferUrl {
    pub fn is_authenticated(&self) -> bool {
        self.plain != self.authenticated
    }
}

impl std::fmt::Debug for TransferUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferUrl")
            .field("plain", &self.plain)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl std::fmt::Display for TransferUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.plain)
    }
}
