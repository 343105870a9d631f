//! Share links.
//!
//! A share link addresses a session as `<baseUrl>/troll-buddy/<userId>/<sessionId>`.
//! Both segments are mandatory and opaque.

use std::fmt;

/// Route segment preceding the user and session ids.
pub const ROUTE: &str = "troll-buddy";

/// Link handed to the participant's client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub base_url: String,
    pub user_id: String,
    pub session_id: String,
}

impl ShareLink {
    pub fn new(base_url: &str, user_id: &str, session_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        }
    }

    /// Parse a link of the form `<anything>/troll-buddy/<userId>/<sessionId>`.
    ///
    /// Returns `None` when the route segment is missing or either id is empty.
    pub fn parse(link: &str) -> Option<Self> {
        let link = link.trim().trim_end_matches('/');
        let marker = format!("/{ROUTE}/");
        let idx = link.rfind(&marker)?;
        let (base, rest) = link.split_at(idx);
        let rest = &rest[marker.len()..];

        let mut parts = rest.split('/');
        let user_id = parts.next().filter(|s| !s.is_empty())?;
        let session_id = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self::new(base, user_id, session_id))
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{ROUTE}/{}/{}",
            self.base_url, self.user_id, self.session_id
        )
    }
}
