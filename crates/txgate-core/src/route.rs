//! Popup routes
//!
//! Approval windows are addressed by request index through the extension's
//! hash router: `popup.html#/fee/{index}?external=true` for fee approval and
//! `popup.html#/sign/{index}` for the signing screen.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::RequestIndex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FeeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external: Option<String>,
}

/// Route of the fee approval page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRoute {
    /// Request being approved
    pub index: RequestIndex,
    /// Opened as a standalone popup rather than by in-app navigation
    pub external: bool,
}

impl ApprovalRoute {
    /// Route for a standalone approval popup
    #[must_use]
    pub fn external(index: RequestIndex) -> Self {
        Self {
            index,
            external: true,
        }
    }

    /// Route for in-app navigation
    #[must_use]
    pub fn in_app(index: RequestIndex) -> Self {
        Self {
            index,
            external: false,
        }
    }

    /// Hash-router path, e.g. `/fee/abc?external=true`
    #[must_use]
    pub fn path(&self) -> String {
        let query = FeeQuery {
            external: self.external.then(|| "true".to_string()),
        };
        match serde_urlencoded::to_string(&query) {
            Ok(q) if !q.is_empty() => format!("/fee/{}?{q}", self.index),
            _ => format!("/fee/{}", self.index),
        }
    }

    /// Full URL under `base`
    #[must_use]
    pub fn to_url(&self, base: &str) -> String {
        format!("{base}#{}", self.path())
    }

    /// Whether the page shows a back button
    #[must_use]
    pub fn shows_back_button(&self) -> bool {
        !self.external
    }

    /// Parse a full URL or a bare hash path
    pub fn parse(url: &str) -> Result<Self> {
        let (path, query) = split_route(url);
        let index = match segments(path).as_slice() {
            ["fee", index] if !index.is_empty() => RequestIndex::from(*index),
            _ => return Err(Error::InvalidRoute(url.to_string())),
        };

        let query: FeeQuery = match query {
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| Error::InvalidRoute(format!("{url}: {e}")))?,
            None => FeeQuery::default(),
        };
        // Any value other than an explicit "false" counts as set
        let external = query.external.is_some_and(|v| v != "false");

        Ok(Self { index, external })
    }
}

/// Route of the signing screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRoute {
    /// Request being signed
    pub index: RequestIndex,
}

impl SignRoute {
    /// Hash-router path
    #[must_use]
    pub fn path(&self) -> String {
        format!("/sign/{}", self.index)
    }

    /// Full URL under `base`
    #[must_use]
    pub fn to_url(&self, base: &str) -> String {
        format!("{base}#{}", self.path())
    }

    /// Parse a full URL or a bare hash path
    pub fn parse(url: &str) -> Result<Self> {
        let (path, _) = split_route(url);
        match segments(path).as_slice() {
            ["sign", index] if !index.is_empty() => Ok(Self {
                index: RequestIndex::from(*index),
            }),
            _ => Err(Error::InvalidRoute(url.to_string())),
        }
    }
}

fn split_route(url: &str) -> (&str, Option<&str>) {
    let route = url.split_once('#').map_or(url, |(_, hash)| hash);
    match route.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (route, None),
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}
