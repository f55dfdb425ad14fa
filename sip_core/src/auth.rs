//! RFC 2617 digest computation and `WWW-Authenticate` challenge parsing.

use md5::{Digest, Md5};

use crate::message::{Header, Response};

/// Nonce count for the single authenticated attempt a session makes.
pub const NONCE_COUNT: &str = "00000001";

/// Quality of protection negotiated from a challenge.
///
/// Any `qop` value mentioning `auth` resolves to [`Qop::Auth`], including
/// `auth-int`. The entity-body hash that `auth-int` needs in HA2 is never
/// computed, so a registrar that only offers `auth-int` will reject the
/// response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    Auth,
}

impl Qop {
    pub fn from_challenge(value: &str) -> Option<Qop> {
        value.contains("auth").then_some(Qop::Auth)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Qop::Auth => "auth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub display_name: String,
}

/// Parameters lifted from the challenge headers of a 401/407, before
/// checking that the mandatory ones are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeFields {
    pub realm: Option<String>,
    pub nonce: Option<String>,
    pub opaque: Option<String>,
    pub qop: Option<Qop>,
    pub algorithm: Option<String>,
    pub stale: Option<String>,
}

/// A usable digest challenge: realm and nonce are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<Qop>,
}

impl ChallengeFields {
    /// Collect parameters from every `WWW-Authenticate` and
    /// `Proxy-Authenticate` header. The first occurrence of each parameter
    /// wins, independently of the others.
    pub fn from_response(resp: &Response) -> Self {
        let mut fields = ChallengeFields::default();
        for header in resp.headers.iter().filter(|h| is_challenge_header(h)) {
            fields.merge_header_value(&header.value);
        }
        fields
    }

    fn merge_header_value(&mut self, value: &str) {
        let value = value.trim();
        let params = match value.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
            Some((scheme, _)) if !scheme.contains('=') => {
                log::debug!("ignoring {scheme} challenge");
                return;
            }
            // No scheme token in front of the parameter list.
            _ => value,
        };

        for (key, val) in parse_auth_params(params) {
            match key.as_str() {
                "realm" => fill(&mut self.realm, val),
                "nonce" => fill(&mut self.nonce, val),
                "opaque" => fill(&mut self.opaque, val),
                "algorithm" => fill(&mut self.algorithm, val),
                "stale" => fill(&mut self.stale, val),
                "qop" => {
                    if self.qop.is_none() {
                        self.qop = Qop::from_challenge(&val);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn into_challenge(self) -> Option<DigestChallenge> {
        Some(DigestChallenge {
            realm: self.realm?,
            nonce: self.nonce?,
            opaque: self.opaque,
            qop: self.qop,
        })
    }
}

fn fill(slot: &mut Option<String>, value: String) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

fn is_challenge_header(header: &Header) -> bool {
    header.name.eq_ignore_ascii_case("WWW-Authenticate")
        || header.name.eq_ignore_ascii_case("Proxy-Authenticate")
}

/// Split a comma separated `key=value` list, honouring quoted strings.
///
/// Keys come back lower-cased; values have their quotes and backslash
/// escapes removed. Whitespace outside quotes is dropped, and so is any
/// stray text between a closing quote and the next comma.
pub fn parse_auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;
    let mut closed = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_quotes {
            match c {
                _ if escaped => {
                    value.push(c);
                    escaped = false;
                }
                '\\' => escaped = true,
                '"' => {
                    in_quotes = false;
                    closed = true;
                }
                _ => value.push(c),
            }
            continue;
        }

        match c {
            ',' => {
                push_param(&mut params, &mut key, &mut value);
                in_value = false;
                closed = false;
            }
            _ if closed => {}
            '=' if !in_value => in_value = true,
            '"' if in_value => in_quotes = true,
            c if c.is_whitespace() => {}
            c if in_value => value.push(c),
            c => key.push(c),
        }
    }
    push_param(&mut params, &mut key, &mut value);

    params
}

fn push_param(params: &mut Vec<(String, String)>, key: &mut String, value: &mut String) {
    let name = key.to_ascii_lowercase();
    key.clear();
    let val = core::mem::take(value);
    if !name.is_empty() {
        params.push((name, val));
    }
}

/// MD5 of `username:realm:password`.
pub fn compute_ha1(username: &str, realm: &str, password: &str) -> String {
    md5_hex(format!("{username}:{realm}:{password}").as_bytes())
}

/// MD5 of `method:uri`.
pub fn compute_ha2(method: &str, uri: &str) -> String {
    md5_hex(format!("{method}:{uri}").as_bytes())
}

/// Final request digest.
///
/// Without a qop this is the RFC 2069 form `H(ha1:nonce:ha2)`; with
/// `qop=auth` the nonce count and client nonce are bound in as well.
pub fn compute_digest_response(
    ha1: &str,
    ha2: &str,
    nonce: &str,
    qop: Option<Qop>,
    nc: &str,
    cnonce: &str,
) -> String {
    let combined = match qop {
        Some(qop) => format!("{ha1}:{nonce}:{nc}:{cnonce}:{}:{ha2}", qop.as_str()),
        None => format!("{ha1}:{nonce}:{ha2}"),
    };
    md5_hex(combined.as_bytes())
}

/// Everything needed to answer one challenge.
#[derive(Debug, Clone, Copy)]
pub struct DigestInputs<'a> {
    pub credentials: &'a Credentials,
    pub challenge: &'a DigestChallenge,
    pub method: &'a str,
    pub uri: &'a str,
    pub nc: &'a str,
    /// Empty when the challenge carried no qop.
    pub cnonce: &'a str,
}

impl DigestInputs<'_> {
    pub fn response(&self) -> String {
        let ha1 = compute_ha1(
            &self.credentials.username,
            &self.challenge.realm,
            &self.credentials.password,
        );
        let ha2 = compute_ha2(self.method, self.uri);
        compute_digest_response(
            &ha1,
            &ha2,
            &self.challenge.nonce,
            self.challenge.qop,
            self.nc,
            self.cnonce,
        )
    }

    /// Value of the `Authorization` header answering the challenge.
    pub fn authorization(&self) -> String {
        let mut value = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\", algorithm=MD5",
            quote(&self.credentials.username),
            quote(&self.challenge.realm),
            quote(&self.challenge.nonce),
            quote(self.uri),
            self.response()
        );
        if let Some(opaque) = &self.challenge.opaque {
            value.push_str(&format!(", opaque=\"{}\"", quote(opaque)));
        }
        if let Some(qop) = self.challenge.qop {
            value.push_str(&format!(
                ", qop={}, nc={}, cnonce=\"{}\"",
                qop.as_str(),
                self.nc,
                self.cnonce
            ));
        }
        value
    }
}

pub fn authorization_header(inputs: &DigestInputs<'_>) -> Header {
    Header::new("Authorization", &inputs.authorization())
}

/// Escape `"` and `\` for use inside a quoted-string.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn md5_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
