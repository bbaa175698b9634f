//! Unit tests for submit validation

use super::submit::*;

#[test]
fn test_validate_queue_name_empty() {
    let mut req = SubmitRequest::new("95358,25315,3691001");
    req.queue = "".to_string();

    let result = validate_request(&req);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("empty"));
}

#[test]
fn test_validate_queue_name_too_long() {
    let mut req = SubmitRequest::new("95358,25315,3691001");
    req.queue = "a".repeat(65);

    let result = validate_request(&req);
    assert!(result.unwrap_err().to_string().contains("too long"));
}

#[test]
fn test_validate_queue_name_invalid_chars() {
    let mut req = SubmitRequest::new("95358,25315,3691001");
    req.queue = "invalid@queue!".to_string();

    let result = validate_request(&req);
    assert!(result.unwrap_err().to_string().contains("alphanumeric"));
}

#[test]
fn test_validate_payload_too_large() {
    let req = SubmitRequest::new("x".repeat(5 * 1024 * 1024 + 1));

    let result = validate_request(&req);
    assert!(result.unwrap_err().to_string().contains("too large"));
}

#[test]
fn test_validate_timeout_bounds() {
    let zero = SubmitRequest::new("a,b,c").with_timeout_secs(0);
    assert!(validate_request(&zero).is_err());

    let day_and_a_second = SubmitRequest::new("a,b,c").with_timeout_secs(86_401);
    assert!(validate_request(&day_and_a_second).is_err());

    let one_day = SubmitRequest::new("a,b,c").with_timeout_secs(86_400);
    assert!(validate_request(&one_day).is_ok());
}

#[test]
fn test_validate_valid_request() {
    let req = SubmitRequest::new("95358,25315,3691001");
    assert!(validate_request(&req).is_ok());
}

#[test]
fn test_empty_payload_is_accepted() {
    // an empty submission renders an empty map
    assert!(validate_request(&SubmitRequest::new("")).is_ok());
}

#[test]
fn test_request_defaults_from_json() {
    let req: SubmitRequest = serde_json::from_str(r#"{"data": "a,b,c"}"#).unwrap();
    assert_eq!(req.queue, "default");
    assert_eq!(req.timeout_secs, None);
}
