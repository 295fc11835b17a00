use data_seeder::core::resilience::{CircuitBreakerConfig, CircuitState, RetryPolicy};
use data_seeder::domain::model::{AccountType, CustomerRequest};
use data_seeder::utils::error::SeederError;
use data_seeder::{
    Accounts, ClientPolicy, Customers, HttpSettings, HttpTransport, ResilientDownstreamClient,
};
use httpmock::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn policy(max_retries: u32) -> ClientPolicy {
    ClientPolicy {
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(20),
            jitter: 0.0,
        },
        ..ClientPolicy::default()
    }
}

fn customer_client(server: &MockServer, policy: ClientPolicy) -> ResilientDownstreamClient<Customers> {
    let transport =
        HttpTransport::new("customer-service", server.base_url(), &HttpSettings::default()).unwrap();
    ResilientDownstreamClient::new(Arc::new(transport), policy)
}

fn account_client(server: &MockServer) -> ResilientDownstreamClient<Accounts> {
    let transport =
        HttpTransport::new("account-service", server.base_url(), &HttpSettings::default()).unwrap();
    ResilientDownstreamClient::new(Arc::new(transport), policy(0))
}

fn request() -> CustomerRequest {
    CustomerRequest {
        name: "Grace Hopper".to_string(),
        email: "grace.hopper123@example.com".to_string(),
        phone: "+1-555-123-4567".to_string(),
    }
}

#[tokio::test]
async fn test_create_customer_round_trip() {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/customer")
            .body_contains("grace.hopper123@example.com");
        then.status(201)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "id": 42,
                "name": "Grace Hopper",
                "email": "grace.hopper123@example.com",
                "phone": "+1-555-123-4567",
                "createdAt": "2024-05-01T12:00:00"
            }));
    });

    let record = customer_client(&server, policy(0))
        .create(&request())
        .await
        .unwrap();

    create_mock.assert();
    assert_eq!(record.id, 42);
    assert_eq!(record.email, "grace.hopper123@example.com");
    assert!(record.created_at.is_some());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/customer");
        then.status(400).body("email already registered");
    });

    let err = customer_client(&server, policy(3))
        .create(&request())
        .await
        .unwrap_err();

    create_mock.assert_hits(1);
    assert!(matches!(err, SeederError::DownstreamRejected { status: 400, .. }));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_budget_is_spent() {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/customer");
        then.status(503).body("maintenance");
    });

    let err = customer_client(&server, policy(2))
        .create(&request())
        .await
        .unwrap_err();

    create_mock.assert_hits(3);
    assert!(matches!(err, SeederError::DownstreamRejected { status: 503, .. }));
}

#[tokio::test]
async fn test_open_breaker_short_circuits_without_calling_service() {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/customer");
        then.status(500);
    });

    let client = customer_client(
        &server,
        ClientPolicy {
            circuit_breaker: CircuitBreakerConfig {
                window_size: 2,
                minimum_calls: 2,
                ..CircuitBreakerConfig::default()
            },
            ..policy(0)
        },
    );

    for _ in 0..2 {
        assert!(client.create(&request()).await.is_err());
    }
    assert_eq!(client.circuit_state(), CircuitState::Open);

    let err = client.create(&request()).await.unwrap_err();

    assert!(matches!(err, SeederError::DownstreamUnavailable { .. }));
    assert!(!err.is_retryable());
    create_mock.assert_hits(2);
}

#[tokio::test]
async fn test_list_by_customer_uses_customer_path() {
    let server = MockServer::start();
    let list_mock = server.mock(|when, then| {
        when.method(GET).path("/account/customer/7");
        then.status(200).json_body(serde_json::json!([
            {
                "id": 70,
                "accountNumber": "ACC0000000070",
                "accountType": "SAVINGS",
                "balance": 1520.75,
                "customerId": 7
            },
            {
                "id": 71,
                "accountNumber": "ACC0000000071",
                "accountType": "BUSINESS",
                "balance": 99000,
                "customerId": 7
            }
        ]));
    });

    let accounts = account_client(&server).list_by_customer(7).await.unwrap();

    list_mock.assert();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a.customer_id == 7));
    assert_eq!(accounts[0].balance, Decimal::new(152075, 2));
    assert_eq!(accounts[1].account_type, AccountType::Business.as_str());
}

#[tokio::test]
async fn test_delete_all_removes_each_listed_record() {
    let server = MockServer::start();
    let list_mock = server.mock(|when, then| {
        when.method(GET).path("/customer");
        then.status(200).json_body(serde_json::json!([
            {"id": 1, "name": "A", "email": "a@example.com", "phone": "1"},
            {"id": 2, "name": "B", "email": "b@example.com", "phone": "2"}
        ]));
    });
    let delete_one = server.mock(|when, then| {
        when.method(DELETE).path("/customer/1");
        then.status(204);
    });
    let delete_two = server.mock(|when, then| {
        when.method(DELETE).path("/customer/2");
        then.status(200).body("Customer deleted");
    });

    let deleted = customer_client(&server, policy(0)).delete_all().await.unwrap();

    assert_eq!(deleted, 2);
    list_mock.assert();
    delete_one.assert();
    delete_two.assert();
}
