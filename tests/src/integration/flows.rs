//! # Authorization Flows
//!
//! Station-facing scenarios against the full stack: the HTTP API, the
//! correlation engine and the in-process authentication worker, all on the
//! in-memory bus.
//!
//! ## Flow Tested
//!
//! 1. **API → auth-request**: dispatcher publishes `{requestId, token}`
//! 2. **Worker**: validation chain, then the token table
//! 3. **auth-response → API**: listener completes the waiting call

#[cfg(test)]
mod tests {
    use crate::TestStack;
    use csms_runtime::RuntimeConfig;
    use serde_json::{json, Value};
    use shared_bus::MessagePublisher;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const ENABLED_TOKEN: &str = "driverABC-1234567890";
    const DISABLED_TOKEN: &str = "DISABLED_suspended-account-driver-token-abc";
    const UNKNOWN_TOKEN: &str = "non-existent-token-xyz";

    async fn stack() -> TestStack {
        TestStack::start(RuntimeConfig::default())
            .await
            .expect("stack should start")
    }

    async fn status_of(stack: &TestStack, token: Option<&str>) -> (u16, Value) {
        let response = stack.authorize(token).await.expect("request should be sent");
        let code = response.status().as_u16();
        let body = response.json().await.expect("body should be JSON");
        (code, body)
    }

    // =============================================================================
    // VERDICTS
    // =============================================================================

    #[tokio::test]
    async fn test_enabled_token_is_accepted() {
        let stack = stack().await;

        let (code, body) = status_of(&stack, Some(ENABLED_TOKEN)).await;
        assert_eq!(code, 200);
        assert_eq!(body, json!({"authenticationStatus": "ACCEPTED"}));

        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_token_is_rejected() {
        let stack = stack().await;

        let (code, body) = status_of(&stack, Some(DISABLED_TOKEN)).await;
        assert_eq!(code, 200);
        assert_eq!(body, json!({"authenticationStatus": "REJECTED"}));

        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_token_is_unknown() {
        let stack = stack().await;

        let (code, body) = status_of(&stack, Some(UNKNOWN_TOKEN)).await;
        assert_eq!(code, 200);
        assert_eq!(body, json!({"authenticationStatus": "UNKNOWN"}));

        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid_without_publish() {
        let stack = stack().await;

        for token in [None, Some(""), Some("   ")] {
            let (code, body) = status_of(&stack, token).await;
            assert_eq!(code, 200);
            assert_eq!(body, json!({"authenticationStatus": "INVALID"}));
        }

        assert_eq!(stack.bus.messages_published(), 0);
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_short_token_is_invalid_via_worker() {
        let stack = stack().await;

        // Present but too short: the worker's length check rejects it
        let (code, body) = status_of(&stack, Some("short-token")).await;
        assert_eq!(code, 200);
        assert_eq!(body, json!({"authenticationStatus": "INVALID"}));

        // One request plus one response
        assert_eq!(stack.bus.messages_published(), 2);
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_driver_identifier_is_invalid() {
        let stack = stack().await;

        let response = stack
            .client
            .post(stack.authorize_url())
            .json(&json!({"stationUuid": "station-7"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"authenticationStatus": "INVALID"}));
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_body_is_client_error() {
        let stack = stack().await;

        let response = stack
            .client
            .post(stack.authorize_url())
            .header("content-type", "application/json")
            .body("{\"stationUuid\": ")
            .send()
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(stack.bus.messages_published(), 0);
        stack.stop().await.unwrap();
    }

    // =============================================================================
    // CONCURRENCY
    // =============================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_get_their_own_verdicts() {
        let stack = stack().await;

        let cases = [
            (ENABLED_TOKEN, "ACCEPTED"),
            (DISABLED_TOKEN, "REJECTED"),
            (UNKNOWN_TOKEN, "UNKNOWN"),
            ("tiny", "INVALID"),
        ];

        let calls = (0..40).map(|i| {
            let (token, expected) = cases[i % cases.len()];
            let stack = &stack;
            async move {
                let (code, body) = status_of(stack, Some(token)).await;
                (code, body, expected)
            }
        });

        for (code, body, expected) in futures::future::join_all(calls).await {
            assert_eq!(code, 200);
            assert_eq!(body["authenticationStatus"], expected);
        }

        let health = stack.health().await.unwrap();
        assert_eq!(health["pending"], 0);
        assert_eq!(health["stats"]["registered"], 40);
        assert_eq!(health["stats"]["completed"], 40);
        stack.stop().await.unwrap();
    }
}
