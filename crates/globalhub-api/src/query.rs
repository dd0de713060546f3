//! Query string and header handling shared by the list endpoints.

use axum::http::HeaderMap;
use axum::http::header::ACCEPT;
use globalhub_core::error::HubResult;
use globalhub_core::pagination::{ContinueToken, PageRequest};
use globalhub_core::selector::Selector;
use serde::Deserialize;

/// Raw list query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u64>,
    #[serde(rename = "labelSelector")]
    pub label_selector: Option<String>,
    #[serde(rename = "continue")]
    pub continue_token: Option<String>,
    pub watch: Option<String>,
}

impl ListParams {
    /// `?watch`, `?watch=true` and `?watch=1` all request a stream.
    pub fn is_watch(&self) -> bool {
        self.watch
            .as_deref()
            .is_some_and(|w| !matches!(w, "false" | "0"))
    }

    /// Validates the selector and continue token.
    pub fn parse(&self) -> HubResult<ListQuery> {
        let selector = match self.label_selector.as_deref() {
            Some(s) => Selector::parse(s)?,
            None => Selector::everything(),
        };
        let mut page = PageRequest::default();
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            page = page.with_limit(limit);
        }
        if let Some(token) = self.continue_token.as_deref().filter(|t| !t.is_empty()) {
            page = page.after(ContinueToken::decode(token)?);
        }
        Ok(ListQuery { page, selector })
    }
}

/// Validated list query.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: PageRequest,
    pub selector: Selector,
}

/// Whether the client negotiated the tabular rendering, i.e. sent
/// `Accept: application/json;as=Table;...`.
pub fn wants_table(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| {
            media
                .split(';')
                .skip(1)
                .any(|param| param.trim().eq_ignore_ascii_case("as=Table"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use globalhub_core::error::HubError;

    #[test]
    fn detects_table_accept_header() {
        let mut headers = HeaderMap::new();
        assert!(!wants_table(&headers));

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/json;as=Table;g=meta.k8s.io;v=v1, application/json",
            ),
        );
        assert!(wants_table(&headers));

        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!wants_table(&headers));
    }

    #[test]
    fn watch_flag_forms() {
        let with = |w: Option<&str>| ListParams {
            watch: w.map(str::to_string),
            ..Default::default()
        };
        assert!(with(Some("")).is_watch());
        assert!(with(Some("true")).is_watch());
        assert!(!with(Some("false")).is_watch());
        assert!(!with(None).is_watch());
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let query = ListParams {
            limit: Some(0),
            ..Default::default()
        }
        .parse()
        .unwrap();
        assert_eq!(query.page.limit, None);
    }

    #[test]
    fn rejects_bad_selector_and_token() {
        let bad_selector = ListParams {
            label_selector: Some("=oops".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_selector.parse(),
            Err(HubError::MalformedSelector { .. })
        ));

        let bad_token = ListParams {
            continue_token: Some("%%%".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_token.parse(),
            Err(HubError::InvalidContinueToken(_))
        ));
    }
}
