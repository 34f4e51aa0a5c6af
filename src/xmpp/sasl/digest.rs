/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::Digest;
use md5::Md5;
use rand::Rng;
use rand::distributions::Alphanumeric;

use super::SaslError;
use super::error::description;

/// Key/value pairs decoded from one DIGEST-MD5 challenge.
#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct SaslChallengeParams {
    params: Vec<(String, String)>,
}

impl SaslChallengeParams {
    /// Parses the decoded challenge text.
    ///
    /// Values are either tokens or quoted strings, and quoted strings may
    /// contain commas and backslash escapes.
    pub fn parse(text: &str) -> Result<SaslChallengeParams, SaslError> {
        let mut params = Vec::new();
        let mut chars = text.chars().peekable();
        loop {
            while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }
            let mut key = String::new();
            let mut has_value = false;
            for c in chars.by_ref() {
                if c == '=' {
                    has_value = true;
                    break;
                }
                key.push(c);
            }
            let key = key.trim().to_ascii_lowercase();
            if !has_value || key.is_empty() || key.contains(',') {
                return Err(SaslError::MalformedChallenge(description::BAD_PAIR));
            }
            while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                chars.next();
            }
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => value.push(c),
                    }
                }
                if !closed {
                    return Err(SaslError::MalformedChallenge(
                        description::UNTERMINATED_QUOTE,
                    ));
                }
                while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
                    chars.next();
                }
                match chars.peek() {
                    None | Some(',') => (),
                    Some(_) => return Err(SaslError::MalformedChallenge(description::BAD_PAIR)),
                }
            } else {
                while let Some(c) = chars.next_if(|c| *c != ',') {
                    value.push(c);
                }
                value.truncate(value.trim_end().len());
            }
            params.push((key, value));
        }
        Ok(SaslChallengeParams { params })
    }

    /// First value of the given directive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Decodes a base64 challenge into its directives.
pub fn decode_challenge(token: &str) -> Result<SaslChallengeParams, SaslError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|_| SaslError::MalformedChallenge(description::BAD_BASE64))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| SaslError::MalformedChallenge(description::BAD_UTF8))?;
    SaslChallengeParams::parse(&text)
}

/// Random client nonce.
pub fn generate_cnonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn hex(digest: &[u8]) -> String {
    let mut text = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(text, "{byte:02x}");
    }
    text
}

fn md5_hex(data: &[u8]) -> String {
    hex(&Md5::digest(data))
}

fn encode_text(text: &str, utf8: bool) -> Result<Vec<u8>, SaslError> {
    if utf8 {
        return Ok(text.as_bytes().to_vec());
    }
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| SaslError::BadCharset))
        .collect()
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// The parts of one digest computation shared by the response and the
/// server proof.
struct DigestState<'a> {
    ha1: String,
    realm: &'a str,
    nonce: &'a str,
    qop: &'static str,
    digest_uri: &'a str,
    utf8: bool,
}

impl<'a> DigestState<'a> {
    fn new(
        params: &'a SaslChallengeParams,
        username: &str,
        password: &str,
        authzid: Option<&str>,
        digest_uri: Option<&'a str>,
        cnonce: &str,
    ) -> Result<DigestState<'a>, SaslError> {
        let nonce = params
            .get("nonce")
            .ok_or(SaslError::MalformedChallenge(description::NO_NONCE))?;
        let algorithm = params.get("algorithm").unwrap_or("md5-sess");
        if !algorithm.eq_ignore_ascii_case("md5-sess") {
            return Err(SaslError::MalformedChallenge(description::BAD_ALGORITHM));
        }
        let qop = match params.get("qop") {
            None => "auth",
            Some(offered) => {
                let offered: Vec<&str> = offered.split(',').map(str::trim).collect();
                ["auth", "auth-int", "auth-conf"]
                    .into_iter()
                    .find(|qop| offered.contains(qop))
                    .ok_or(SaslError::MalformedChallenge(description::BAD_QOP))?
            }
        };
        let digest_uri = digest_uri
            .or_else(|| params.get("digest-uri"))
            .ok_or(SaslError::MissingDigestUri)?;
        let utf8 = params
            .get("charset")
            .is_some_and(|charset| charset.eq_ignore_ascii_case("utf-8"));
        let realm = params.get("realm").unwrap_or("");

        let mut secret = encode_text(username, utf8)?;
        secret.push(b':');
        secret.extend(encode_text(realm, utf8)?);
        secret.push(b':');
        secret.extend(encode_text(password, utf8)?);
        let mut a1 = Md5::digest(&secret).to_vec();
        a1.extend_from_slice(format!(":{nonce}:{cnonce}").as_bytes());
        if let Some(authzid) = authzid {
            a1.push(b':');
            a1.extend_from_slice(authzid.as_bytes());
        }

        Ok(DigestState {
            ha1: md5_hex(&a1),
            realm,
            nonce,
            qop,
            digest_uri,
            utf8,
        })
    }

    fn compute(&self, a2_prefix: &str, cnonce: &str, nc: &str) -> String {
        let mut a2 = format!("{a2_prefix}:{}", self.digest_uri);
        if self.qop != "auth" {
            a2.push_str(":00000000000000000000000000000000");
        }
        let ha2 = md5_hex(a2.as_bytes());
        md5_hex(
            format!(
                "{}:{}:{nc}:{cnonce}:{}:{ha2}",
                self.ha1, self.nonce, self.qop
            )
            .as_bytes(),
        )
    }
}

/// Computes the base64 encoded DIGEST-MD5 response to a first challenge
/// (RFC 2831 section 2.1.2).
///
/// `digest_uri` is normally `xmpp/<domain>`; when it is not given the value
/// from the challenge is used, and `MissingDigestUri` is returned if there
/// is none. A random cnonce is generated when `cnonce` is None.
pub fn compute_digest_response(
    params: &SaslChallengeParams,
    username: &str,
    password: &str,
    authzid: Option<&str>,
    digest_uri: Option<&str>,
    cnonce: Option<&str>,
    nc: &str,
) -> Result<String, SaslError> {
    let cnonce = match cnonce {
        Some(cnonce) => cnonce.to_string(),
        None => generate_cnonce(),
    };
    let state = DigestState::new(params, username, password, authzid, digest_uri, &cnonce)?;
    let response = state.compute("AUTHENTICATE", &cnonce, nc);

    let mut text = format!(
        "username={},realm={},nonce={},cnonce={},nc={nc},qop={},digest-uri={},response={response}",
        quote(username),
        quote(state.realm),
        quote(state.nonce),
        quote(&cnonce),
        state.qop,
        quote(state.digest_uri),
    );
    if state.utf8 {
        text.push_str(",charset=utf-8");
    }
    if let Some(authzid) = authzid {
        text.push_str(",authzid=");
        text.push_str(&quote(authzid));
    }
    Ok(STANDARD.encode(text))
}

/// Computes the `rspauth` value the server must send back to prove it
/// knows the password.
pub fn compute_rspauth(
    params: &SaslChallengeParams,
    username: &str,
    password: &str,
    authzid: Option<&str>,
    digest_uri: Option<&str>,
    cnonce: &str,
    nc: &str,
) -> Result<String, SaslError> {
    let state = DigestState::new(params, username, password, authzid, digest_uri, cnonce)?;
    Ok(state.compute("", cnonce, nc))
}
