use crate::ids::SessionId;
use crate::pages;
use std::io::Cursor;
use tiny_http::{Header, Response, StatusCode};
use tracing::warn;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "session";

pub const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

/// A generated page, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Session bound by a `Set-Cookie` header
    pub cookie: Option<SessionId>,
}

impl PageResponse {
    /// Successful page bound to `session`.
    pub fn page(body: String, session: &SessionId) -> Self {
        Self {
            status: 200,
            content_type: CONTENT_TYPE_HTML,
            body,
            cookie: Some(session.clone()),
        }
    }

    /// Fixed-body error page.
    pub fn error(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: CONTENT_TYPE_HTML,
            body: body.to_string(),
            cookie: None,
        }
    }

    pub fn not_found() -> Self {
        Self::error(404, pages::NOT_FOUND_ERROR)
    }

    pub fn not_acceptable() -> Self {
        Self::error(406, pages::METHOD_ERROR)
    }

    pub fn internal_error() -> Self {
        Self::error(500, pages::INTERNAL_ERROR)
    }

    /// `Set-Cookie` header value, if the response binds a session.
    pub fn set_cookie(&self) -> Option<String> {
        self.cookie
            .as_ref()
            .map(|id| format!("{}={}; Path=/; HttpOnly", COOKIE_NAME, id))
    }

    /// Convert into a response the network layer can send.
    pub fn into_http(self) -> Response<Cursor<Vec<u8>>> {
        let mut headers = vec![("Content-Type", self.content_type.to_string())];
        if let Some(cookie) = self.set_cookie() {
            headers.push(("Set-Cookie", cookie));
        }

        let mut response =
            Response::from_data(self.body.into_bytes()).with_status_code(StatusCode(self.status));
        for (name, value) in headers {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(h) => response.add_header(h),
                Err(()) => warn!(header = name, "dropping malformed response header"),
            }
        }
        response
    }
}

/// Value of cookie `name` in a `Cookie` request header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k.trim() == name).then(|| v.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        assert_eq!(cookie_value("a=b; session=ABC", "session"), Some("ABC"));
        assert_eq!(cookie_value("sessionx=1", "session"), None);
        assert_eq!(cookie_value("", "session"), None);
    }

    #[test]
    fn test_error_pages_carry_no_cookie() {
        let r = PageResponse::not_found();
        assert_eq!(r.status, 404);
        assert_eq!(r.set_cookie(), None);
        assert_eq!(r.body, pages::NOT_FOUND_ERROR);
    }
}
