use url::Url;

use crate::models::repo::TransferUrl;

/// Embed `username:token@` into an unauthenticated HTTPS URL.
///
/// Anything that is not HTTPS, already carries userinfo, or does not parse is
/// returned unchanged, so applying this twice is the same as applying it once.
pub fn with_credentials(clone_url: &str, username: &str, token: &str) -> String {
    let mut parsed = match Url::parse(clone_url) {
        Ok(u) => u,
        Err(_) => return clone_url.to_string(),
    };

    if parsed.scheme() != "https" || !parsed.username().is_empty() || parsed.password().is_some()
    {
        return clone_url.to_string();
    }

    if parsed.set_username(username).is_err() || parsed.set_password(Some(token)).is_err() {
        return clone_url.to_string();
    }

    // Url normalizes an empty path to "/"; keep the caller's spelling otherwise.
    let rendered = parsed.to_string();
    if !clone_url.ends_with('/') && parsed.path() == "/" && rendered.ends_with('/') {
        rendered.trim_end_matches('/').to_string()
    } else {
        rendered
    }
}

/// Build the transfer pair for one repository.
pub fn transfer_url(clone_url: &str, username: &str, token: &str) -> TransferUrl {
    TransferUrl {
        plain: clone_url.to_string(),
        authenticated: with_credentials(clone_url, username, token),
    }
}

/// Strip any password from a URL before it goes anywhere near a log line.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
