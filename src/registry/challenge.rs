//! Bearer challenge parsing.
//!
//! Registries answer an unauthenticated `/v2/` request with
//! `WWW-Authenticate: Bearer realm="<url>",service="<name>"`. Only the first
//! two quoted values are significant, in order of appearance.

use thiserror::Error;

/// Where a client must go to obtain a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WwwAuthenticate {
    pub realm: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid WWW-Authenticate header: {0}")]
pub struct ChallengeError(pub String);

impl WwwAuthenticate {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self, ChallengeError> {
        let mut values = QuotedValues::new(header);
        match (values.next(), values.next()) {
            (Some(realm), Some(service)) => Ok(Self {
                realm: realm.to_string(),
                service: service.to_string(),
            }),
            _ => Err(ChallengeError(header.to_string())),
        }
    }
}

/// Yields every `="..."` value in a header, raw (escape sequences kept).
struct QuotedValues<'a> {
    rest: &'a str,
}

impl<'a> QuotedValues<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }
}

impl<'a> Iterator for QuotedValues<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let open = self.rest.find("=\"")?;
            let body = &self.rest[open + 2..];

            let mut escaped = false;
            let close = body.char_indices().find_map(|(i, c)| match (escaped, c) {
                (true, _) => {
                    escaped = false;
                    None
                }
                (false, '\\') => {
                    escaped = true;
                    None
                }
                (false, '"') => Some(i),
                _ => None,
            });

            match close {
                Some(end) => {
                    // Resume at the closing quote, like a non-consuming lookahead.
                    self.rest = &body[end..];
                    return Some(&body[..end]);
                }
                None => {
                    self.rest = body;
                    continue;
                }
            }
        }
    }
}
