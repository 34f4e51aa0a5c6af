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

use super::*;

const RFC2831_CHALLENGE: &str = "realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",\
                                 qop=\"auth\",algorithm=md5-sess,charset=utf-8";

fn rfc2831_params() -> SaslChallengeParams {
    decode_challenge(&STANDARD.encode(RFC2831_CHALLENGE)).unwrap()
}

fn decoded(token: &str) -> String {
    String::from_utf8(STANDARD.decode(token).unwrap()).unwrap()
}

#[test]
fn challenge_decoding() {
    let params = rfc2831_params();
    assert_eq!(params.len(), 5);
    assert_eq!(params.get("realm"), Some("elwood.innosoft.com"));
    assert_eq!(params.get("nonce"), Some("OA6MG9tEQGm2hh"));
    assert_eq!(params.get("algorithm"), Some("md5-sess"));
    assert_eq!(params.get("charset"), Some("utf-8"));
    assert_eq!(params.get("cipher"), None);

    let params =
        SaslChallengeParams::parse(" qop=\"auth,auth-int\" , realm=\"a \\\"b\\\"\",stale=true").unwrap();
    assert_eq!(params.get("qop"), Some("auth,auth-int"));
    assert_eq!(params.get("realm"), Some("a \"b\""));
    assert_eq!(params.get("stale"), Some("true"));

    assert!(SaslChallengeParams::parse("").unwrap().is_empty());
}

#[test]
fn malformed_challenges() {
    assert!(matches!(
        decode_challenge("not base64!"),
        Err(SaslError::MalformedChallenge(_))
    ));
    assert!(matches!(
        SaslChallengeParams::parse("nonce=\"abc"),
        Err(SaslError::MalformedChallenge(_))
    ));
    assert!(matches!(
        SaslChallengeParams::parse("nonce"),
        Err(SaslError::MalformedChallenge(_))
    ));
    assert!(matches!(
        SaslChallengeParams::parse("=abc"),
        Err(SaslError::MalformedChallenge(_))
    ));
    assert!(matches!(
        SaslChallengeParams::parse("nonce=\"a\"b"),
        Err(SaslError::MalformedChallenge(_))
    ));
}

#[test]
fn rfc2831_vector() {
    let params = rfc2831_params();
    let token = compute_digest_response(
        &params,
        "chris",
        "secret",
        None,
        Some("imap/elwood.innosoft.com"),
        Some("OA6MHXh6VqTrRk"),
        "00000001",
    )
    .unwrap();
    assert_eq!(
        decoded(&token),
        "username=\"chris\",realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",\
         cnonce=\"OA6MHXh6VqTrRk\",nc=00000001,qop=auth,\
         digest-uri=\"imap/elwood.innosoft.com\",\
         response=d388dad90d4bbd760a152321f2143af7,charset=utf-8"
    );

    let rspauth = compute_rspauth(
        &params,
        "chris",
        "secret",
        None,
        Some("imap/elwood.innosoft.com"),
        "OA6MHXh6VqTrRk",
        "00000001",
    )
    .unwrap();
    assert_eq!(rspauth, "ea40f60335c427b5527b84dbabcdfffd");
}

#[test]
fn digest_defaults() {
    let params = SaslChallengeParams::parse("nonce=\"abc\"").unwrap();
    let token =
        compute_digest_response(&params, "juliet", "r0m30", None, Some("xmpp/example.com"), None, "00000001")
            .unwrap();
    let text = decoded(&token);
    assert!(text.starts_with("username=\"juliet\",realm=\"\",nonce=\"abc\",cnonce=\""));
    assert!(text.contains(",qop=auth,"));
    assert!(!text.contains("charset"));
}

#[test]
fn digest_errors() {
    let params = SaslChallengeParams::parse("realm=\"x\"").unwrap();
    assert!(matches!(
        compute_digest_response(&params, "a", "b", None, Some("xmpp/x"), None, "00000001"),
        Err(SaslError::MalformedChallenge(_))
    ));

    let params = SaslChallengeParams::parse("nonce=\"abc\"").unwrap();
    assert_eq!(
        compute_digest_response(&params, "a", "b", None, None, None, "00000001"),
        Err(SaslError::MissingDigestUri)
    );

    let params = SaslChallengeParams::parse("nonce=\"abc\",algorithm=md5").unwrap();
    assert!(matches!(
        compute_digest_response(&params, "a", "b", None, Some("xmpp/x"), None, "00000001"),
        Err(SaslError::MalformedChallenge(_))
    ));

    let params = SaslChallengeParams::parse("nonce=\"abc\",qop=\"token\"").unwrap();
    assert!(matches!(
        compute_digest_response(&params, "a", "b", None, Some("xmpp/x"), None, "00000001"),
        Err(SaslError::MalformedChallenge(_))
    ));
}

#[test]
fn digest_charsets() {
    // Latin-1 fallback gives the same bytes as utf-8 for ASCII only
    let latin = SaslChallengeParams::parse("nonce=\"n\"").unwrap();
    let utf8 = SaslChallengeParams::parse("nonce=\"n\",charset=utf-8").unwrap();
    let proof = |params: &SaslChallengeParams, user: &str| {
        compute_rspauth(params, user, "pw", None, Some("xmpp/x"), "c", "00000001")
    };
    assert_eq!(proof(&latin, "romeo").unwrap(), proof(&utf8, "romeo").unwrap());
    assert_ne!(proof(&latin, "rom\u{e9}o").unwrap(), proof(&utf8, "rom\u{e9}o").unwrap());
    assert_eq!(proof(&latin, "\u{3b1}\u{3b2}"), Err(SaslError::BadCharset));
    assert!(proof(&utf8, "\u{3b1}\u{3b2}").is_ok());
}

#[test]
fn auth_int_changes_response() {
    let auth = SaslChallengeParams::parse("nonce=\"n\",qop=\"auth\"").unwrap();
    let auth_int = SaslChallengeParams::parse("nonce=\"n\",qop=\"auth-int\"").unwrap();
    let proof = |params: &SaslChallengeParams| {
        compute_rspauth(params, "u", "p", None, Some("xmpp/x"), "c", "00000001").unwrap()
    };
    assert_ne!(proof(&auth), proof(&auth_int));
}

#[test]
fn plain_credentials() {
    let token = generate_plain_credential(None, "juliet", "r0m30");
    assert_eq!(token, STANDARD.encode("\0juliet\0r0m30"));
    let creds = validate_plain_credentials(&token).unwrap();
    assert_eq!(creds.authzid, None);
    assert_eq!(creds.authcid, "juliet");
    assert_eq!(creds.password, "r0m30");

    let token = generate_plain_credential(Some("admin@example.com"), "juliet", "r0m30");
    let creds = validate_plain_credentials(&token).unwrap();
    assert_eq!(creds.authzid.as_deref(), Some("admin@example.com"));

    for bad in ["juliet\0r0m30", "\0a\0b\0c", "\0\0pw"] {
        assert_eq!(
            validate_plain_credentials(&STANDARD.encode(bad)),
            Err(SaslError::AuthenticationFailure)
        );
    }
    assert_eq!(
        validate_plain_credentials("***"),
        Err(SaslError::AuthenticationFailure)
    );
}

#[test]
fn google_token() {
    assert_eq!(
        generate_google_token_credential("juliet@gmail.com", "tok"),
        STANDARD.encode("\0juliet@gmail.com\0tok")
    );
}

#[test]
fn mechanism_selection() {
    let offered = ["PLAIN", "DIGEST-MD5", "X-UNKNOWN"];
    assert_eq!(
        Mechanism::select(offered, |_| true),
        Some(Mechanism::DigestMd5)
    );
    assert_eq!(
        Mechanism::select(offered, |m| m != Mechanism::DigestMd5),
        Some(Mechanism::Plain)
    );
    assert_eq!(Mechanism::select(["X-UNKNOWN"], |_| true), None);
    assert_eq!(
        Mechanism::select(["ANONYMOUS", "X-GOOGLE-TOKEN"], |_| true),
        Some(Mechanism::XGoogleToken)
    );
    assert_eq!(Mechanism::from_name("DIGEST-MD5"), Some(Mechanism::DigestMd5));
}

#[test]
fn failure_conditions() {
    assert_eq!(SaslError::from_condition("not-authorized"), SaslError::NotAuthorized);
    assert_eq!(
        SaslError::from_condition("temporary-auth-failure"),
        SaslError::Failure("temporary-auth-failure".to_string())
    );
}
