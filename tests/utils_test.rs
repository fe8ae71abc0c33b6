use playlist_tuner::error::AppError;
use playlist_tuner::utils::*;

#[test]
fn test_generate_code_verifier() {
    let verifier = generate_code_verifier();

    // Should be exactly 128 characters
    assert_eq!(verifier.len(), 128);

    // Should contain only alphanumeric characters
    assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));

    // Two generated verifiers should be different
    let verifier2 = generate_code_verifier();
    assert_ne!(verifier, verifier2);
}

#[test]
fn test_generate_code_challenge() {
    let verifier = "test_verifier_123";
    let challenge = generate_code_challenge(verifier);

    // Should not be empty
    assert!(!challenge.is_empty());

    // Should be deterministic - same input produces same output
    let challenge2 = generate_code_challenge(verifier);
    assert_eq!(challenge, challenge2);

    // Different input should produce different output
    let challenge3 = generate_code_challenge("different_verifier");
    assert_ne!(challenge, challenge3);

    // Should be base64-encoded (URL-safe, no padding)
    assert!(
        challenge
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    );
}

#[test]
fn test_generate_code_challenge_known_value() {
    // RFC 7636 appendix B
    let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
    assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
}

#[test]
fn test_generate_state() {
    let state = generate_state();
    assert_eq!(state.len(), 32);
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(state, generate_state());
}

#[test]
fn test_validate_playlist_id() {
    assert!(validate_playlist_id("37i9dQZF1DXcBWIGoYBM5M").is_ok());

    assert!(matches!(
        validate_playlist_id(""),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        validate_playlist_id("abc/../me"),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        validate_playlist_id("abc?x=1"),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn test_release_year() {
    assert_eq!(release_year("1999-12-31"), Some(1999));
    assert_eq!(release_year("2004-05"), Some(2004));
    assert_eq!(release_year("1987"), Some(1987));

    // Too short or not numeric
    assert_eq!(release_year("87"), None);
    assert_eq!(release_year(""), None);
    assert_eq!(release_year("unknown"), None);
    assert_eq!(release_year("19x5-01-01"), None);
}

#[test]
fn test_escape_html() {
    assert_eq!(escape_html("Rock & Roll"), "Rock &amp; Roll");
    assert_eq!(
        escape_html("<script>alert('x')</script>"),
        "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
    );
    assert_eq!(escape_html("say \"hi\""), "say &quot;hi&quot;");
    assert_eq!(escape_html("plain"), "plain");
}
