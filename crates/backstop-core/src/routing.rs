//! Endpoint routing for API paths
//!
//! A [`Router`] maps request paths onto base URLs. Most calls go to the
//! default endpoint; path prefixes can be pointed at other endpoints.

use url::Url;

use crate::error::{Error, Result};

/// Maps request paths onto endpoint base URLs
#[derive(Debug, Clone)]
pub struct Router {
    default_url: Url,
    overrides: Vec<(String, Url)>,
}

impl Router {
    /// Router sending every path to `default_url`
    pub fn new(default_url: &str) -> Result<Self> {
        Ok(Self {
            default_url: Url::parse(default_url)?,
            overrides: Vec::new(),
        })
    }

    /// Route paths under `prefix` to `url`
    ///
    /// Prefixes match whole segments: `/v1/images` matches `/v1/images/7`
    /// but not `/v1/imagesets`.
    pub fn with_override(mut self, prefix: &str, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        // A root prefix is stored empty and matches every path.
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        };
        self.overrides.push((prefix, url));
        Ok(self)
    }

    /// Absolute URL for `path`
    ///
    /// `path` is relative to the endpoint and may carry a query string. The
    /// longest matching override wins; the base URL's own path is kept.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        validate_path(path)?;

        let (path_part, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let base = self
            .overrides
            .iter()
            .filter(|(prefix, _)| matches_prefix(path_part, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, url)| url)
            .unwrap_or(&self.default_url);

        let mut url = base.clone();
        let joined = format!("{}{}", base.path().trim_end_matches('/'), path_part);
        url.set_path(&joined);
        url.set_query(query);
        Ok(url)
    }

    /// The fallback endpoint
    pub fn default_url(&self) -> &Url {
        &self.default_url
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::bad_argument("request path must not be empty"));
    }
    if path.starts_with("//") {
        return Err(Error::bad_argument(format!(
            "request path must not name a host: {}",
            path
        )));
    }
    if Url::parse(path).is_ok() {
        return Err(Error::bad_argument(format!(
            "request path must not carry a scheme: {}",
            path
        )));
    }
    if !path.starts_with('/') {
        return Err(Error::bad_argument(format!(
            "request path must start with '/': {}",
            path
        )));
    }
    Ok(())
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Headers sent with every API request
///
/// Requests that carry a body also declare it as JSON.
pub fn standard_headers(method: &str, user_agent: &str) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("User-Agent", user_agent.to_string()),
        ("Accept", "application/json".to_string()),
    ];
    if matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH"
    ) {
        headers.push(("Content-Type", "application/json".to_string()));
    }
    headers
}
