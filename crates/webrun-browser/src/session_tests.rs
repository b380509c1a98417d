use tempfile::TempDir;

use super::*;

fn manager_with_node(node: &str) -> PlaywrightSessionManager {
    let browser = BrowserConfig {
        node_path: Some(std::path::PathBuf::from(node)),
        headless: true,
        ..Default::default()
    };
    PlaywrightSessionManager::new(&browser, &AiConfig::default())
}

#[test]
fn test_manager_takes_config() {
    let browser = BrowserConfig {
        headless: true,
        args: vec!["--disable-gpu".to_string()],
        ..Default::default()
    };
    let ai = AiConfig {
        action_timeout_ms: 120_000,
        ..Default::default()
    };

    let manager = PlaywrightSessionManager::new(&browser, &ai);

    assert!(manager.headless());
    assert_eq!(manager.browser_args, vec!["--disable-gpu"]);
    assert_eq!(manager.ai_timeout, Duration::from_secs(120));
    assert_eq!(manager.bridge_config().response_timeout_ms, 30000);
}

#[test]
fn test_auth_state_used_only_when_file_exists() {
    let temp = TempDir::new().unwrap();
    let existing = temp.path().join("auth.json");
    std::fs::write(&existing, "{}").unwrap();
    let missing = temp.path().join("missing.json");

    assert_eq!(usable_auth_state(Some(existing.as_path())), Some(existing.as_path()));
    assert_eq!(usable_auth_state(Some(missing.as_path())), None);
    assert_eq!(usable_auth_state(Some(temp.path())), None);
    assert_eq!(usable_auth_state(None), None);
}

#[test]
fn test_agent_error_keeps_agent_message() {
    let err = agent_error(PlaywrightError::BridgeError("Element not found: login".to_string()));
    assert!(matches!(err, DriverError::Agent(_)));
    assert_eq!(err.to_string(), "AI agent error: Element not found: login");

    let err = agent_error(PlaywrightError::Timeout("Method aiTap timed out".to_string()));
    assert!(matches!(err, DriverError::Timeout(_)));
}

#[tokio::test]
async fn test_release_without_session_is_noop() {
    let manager = manager_with_node("/nonexistent/node");
    manager.release(None).await;
    assert!(!manager.is_active().await);
}

#[tokio::test]
async fn test_acquire_with_missing_node_fails_cleanly() {
    let manager = manager_with_node("/nonexistent/webrun-node");

    let result = manager
        .acquire(BrowserKind::Chromium, Viewport::default(), None)
        .await;

    let err = match result {
        Ok(_) => panic!("acquire should fail without node"),
        Err(e) => e,
    };
    assert!(matches!(err, DriverError::Launch(_)), "{err}");
    assert!(!manager.is_active().await);

    // The orchestrator still releases once.
    manager.release(None).await;
    assert!(!manager.is_active().await);
}
