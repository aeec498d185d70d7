//! Meeting join-link parsing.

use std::{str::FromStr, sync::LazyLock};

use {regex::Regex, url::Url};

use crate::error::{Error, Result};

/// Path shapes that carry a meeting id: `/j/<id>`, `/s/<id>`,
/// `/wc/join/<id>` and `/wc/<id>`.
#[allow(clippy::expect_used)]
static MEETING_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:j|s|wc/join|wc)/(\d+)(?:[/?#]|$)").expect("valid meeting id regex")
});

#[allow(clippy::expect_used)]
static PASSWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]pwd=([^&#]*)").expect("valid password regex"));

/// Meeting identifier and optional access password taken from a join link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRef {
    id: String,
    password: Option<String>,
}

impl MeetingRef {
    pub fn new(id: impl Into<String>, password: Option<String>) -> Self {
        Self {
            id: id.into(),
            password,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Web-client join URL for this meeting under `base`
    /// (e.g. `https://zoom.us`).
    ///
    /// The `pwd` query parameter is omitted when there is no password and
    /// kept, empty, when the password is an empty string.
    pub fn join_url(&self, base: &str) -> Result<String> {
        let mut url = Url::parse(base).map_err(|_| Error::invalid_link(base))?;
        url.path_segments_mut()
            .map_err(|()| Error::invalid_link(base))?
            .pop_if_empty()
            .extend(["wc", "join", self.id.as_str()]);
        if let Some(ref pwd) = self.password {
            url.query_pairs_mut().append_pair("pwd", pwd);
        }
        Ok(url.into())
    }
}

impl FromStr for MeetingRef {
    type Err = Error;

    fn from_str(link: &str) -> Result<Self> {
        parse(link)
    }
}

/// Extract a [`MeetingRef`] from a join link.
///
/// Fails with [`Error::InvalidLink`] when no meeting-id segment is present.
/// A missing or empty `pwd` parameter yields no password.
pub fn parse(link: &str) -> Result<MeetingRef> {
    let link = link.trim();
    let id = MEETING_ID_RE
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::invalid_link(link))?;

    let password = PASSWORD_RE
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_component(m.as_str()))
        .filter(|pwd| !pwd.is_empty());

    Ok(MeetingRef { id, password })
}

fn decode_component(raw: &str) -> String {
    url::form_urlencoded::parse(format!("v={raw}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| raw.to_string())
}
