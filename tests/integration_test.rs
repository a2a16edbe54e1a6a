use netpath::error::{NetpathError, Result};

#[test]
fn test_error_types() {
    let err = NetpathError::QueueFull { capacity: 1000 };

    assert!(err.to_string().contains("1000"));
    assert!(err.to_string().contains("full"));
}

#[test]
fn test_probe_error_wraps_message() {
    fn probe_failed() -> Result<()> {
        Err(NetpathError::Probe("destination unreachable".to_string()))
    }

    let err = probe_failed().unwrap_err();
    assert!(err.to_string().contains("destination unreachable"));
}

#[test]
fn test_version_const() {
    assert!(!netpath::VERSION.is_empty());
}
