//! # Degraded Operation
//!
//! Behaviour when the worker is missing, slow or answering for calls that no
//! longer exist. The in-process worker is disabled and the bus is driven by
//! hand.

#[cfg(test)]
mod tests {
    use crate::TestStack;
    use csms_runtime::RuntimeConfig;
    use serde_json::json;
    use shared_bus::{BusMessage, ChannelFilter, MessagePublisher, Subscription};
    use shared_types::{AuthenticationMessage, AuthenticationResponse, AuthenticationStatus};
    use std::time::Duration;
    use tokio::time::timeout;

    const TOKEN: &str = "driverABC-1234567890";

    fn config_without_worker(timeout_secs: u64) -> RuntimeConfig {
        let mut config = RuntimeConfig {
            worker_enabled: false,
            ..RuntimeConfig::default()
        };
        config.transactions.authorization.timeout = Duration::from_secs(timeout_secs);
        config
    }

    async fn respond(stack: &TestStack, request_id: &str, status: AuthenticationStatus) {
        let response = AuthenticationResponse::new(request_id, status);
        stack
            .bus
            .publish(BusMessage::encode("auth-response", request_id, &response).unwrap())
            .await
            .unwrap();
    }

    async fn wait_for_unmatched(stack: &TestStack, expected: u64) -> serde_json::Value {
        timeout(Duration::from_secs(2), async {
            loop {
                let health = stack.health().await.unwrap();
                if health["stats"]["unmatched"] == expected {
                    return health;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("listener should record the stray response")
    }

    #[tokio::test]
    async fn test_no_worker_is_gateway_timeout() {
        let stack = TestStack::start(config_without_worker(1)).await.unwrap();

        let response = stack.authorize(Some(TOKEN)).await.unwrap();
        assert_eq!(response.status().as_u16(), 504);
        assert!(response.bytes().await.unwrap().is_empty());

        let health = stack.health().await.unwrap();
        assert_eq!(health["pending"], 0);
        assert_eq!(health["stats"]["removed"], 1);
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_late_response_is_discarded() {
        let stack = TestStack::start(config_without_worker(1)).await.unwrap();
        let mut requests = stack
            .bus
            .subscribe_group(ChannelFilter::channel("auth-request"), "slow-worker");

        let response = stack.authorize(Some(TOKEN)).await.unwrap();
        assert_eq!(response.status().as_u16(), 504);

        // The worker finally answers
        let request: AuthenticationMessage = requests.recv().await.unwrap().decode().unwrap();
        let request_id = request.request_id.unwrap();
        respond(&stack, &request_id, AuthenticationStatus::Accepted).await;

        let health = wait_for_unmatched(&stack, 1).await;
        assert_eq!(health["pending"], 0);
        assert_eq!(health["stats"]["completed"], 0);
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_scripted_worker_answers_in_time() {
        let stack = TestStack::start(config_without_worker(5)).await.unwrap();
        let mut requests = stack
            .bus
            .subscribe_group(ChannelFilter::channel("auth-request"), "scripted-worker");

        let call = {
            let client = stack.client.clone();
            let url = stack.authorize_url();
            tokio::spawn(async move {
                client
                    .post(url)
                    .json(&json!({"stationUuid": "s-1", "driverIdentifier": {"id": TOKEN}}))
                    .send()
                    .await
            })
        };

        let request: AuthenticationMessage = requests.recv().await.unwrap().decode().unwrap();
        assert_eq!(request.token.as_deref(), Some(TOKEN));
        respond(&stack, &request.request_id.unwrap(), AuthenticationStatus::Rejected).await;

        let response = call.await.unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!({"authenticationStatus": "REJECTED"}));
        stack.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stray_responses_do_not_disturb_the_table() {
        let stack = TestStack::start(config_without_worker(5)).await.unwrap();

        respond(&stack, "not-a-correlation-id", AuthenticationStatus::Accepted).await;
        respond(
            &stack,
            "6f1c2a3b-0000-4000-8000-000000000000",
            AuthenticationStatus::Rejected,
        )
        .await;

        let health = wait_for_unmatched(&stack, 2).await;
        assert_eq!(health["pending"], 0);
        assert_eq!(health["status"], "ok");
        stack.stop().await.unwrap();
    }
}
