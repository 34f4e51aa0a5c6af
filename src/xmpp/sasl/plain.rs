/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::SaslError;

/// Decoded PLAIN initial response (RFC 4616).
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct PlainCredentials {
    pub authzid: Option<String>,
    pub authcid: String,
    pub password: String,
}

fn nul_joined(first: &str, second: &str, third: &str) -> String {
    let mut text = String::with_capacity(first.len() + second.len() + third.len() + 2);
    text.push_str(first);
    text.push('\0');
    text.push_str(second);
    text.push('\0');
    text.push_str(third);
    STANDARD.encode(text)
}

/// Base64 of `authzid NUL authcid NUL password`.
pub fn generate_plain_credential(authzid: Option<&str>, authcid: &str, password: &str) -> String {
    nul_joined(authzid.unwrap_or(""), authcid, password)
}

/// Reverse of `generate_plain_credential`, for the receiving side.
pub fn validate_plain_credentials(token: &str) -> Result<PlainCredentials, SaslError> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|_| SaslError::AuthenticationFailure)?;
    let text = String::from_utf8(bytes).map_err(|_| SaslError::AuthenticationFailure)?;
    let parts: Vec<&str> = text.split('\0').collect();
    let [authzid, authcid, password] = parts.as_slice() else {
        return Err(SaslError::AuthenticationFailure);
    };
    if authcid.is_empty() {
        return Err(SaslError::AuthenticationFailure);
    }
    Ok(PlainCredentials {
        authzid: (!authzid.is_empty()).then(|| authzid.to_string()),
        authcid: authcid.to_string(),
        password: password.to_string(),
    })
}

/// X-GOOGLE-TOKEN initial response, `NUL user NUL token`.
pub fn generate_google_token_credential(username: &str, token: &str) -> String {
    nul_joined("", username, token)
}
