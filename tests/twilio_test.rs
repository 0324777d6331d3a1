//! Integration tests for the Twilio gateway client.
//!
//! Each test spins up an Axum stub of the Twilio REST API on a random
//! port and points the client at it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;

use sms_relay::config::GatewayConfig;
use sms_relay::error::GatewayError;
use sms_relay::gateway::{OutboundSms, SmsGateway, TwilioClient};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What the stub saw.
#[derive(Clone, Default)]
struct Recorded {
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

/// Start a Twilio stub; `reject` makes message creation fail with 400.
async fn start_stub(reject: bool) -> (String, Recorded) {
    let recorded = Recorded::default();

    let app = Router::new()
        .route(
            "/2010-04-01/Accounts/{sid}/Messages.json",
            post(
                move |State(rec): State<Recorded>,
                      Path(_sid): Path<String>,
                      headers: HeaderMap,
                      Form(form): Form<HashMap<String, String>>| async move {
                    rec.auth.lock().unwrap().push(
                        headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from),
                    );
                    rec.forms.lock().unwrap().push(form);
                    if reject {
                        (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "code": 21211,
                                "message": "The 'To' number is not a valid phone number.",
                                "status": 400
                            })),
                        )
                            .into_response()
                    } else {
                        (
                            StatusCode::CREATED,
                            Json(json!({"sid": "SM123456789", "status": "queued"})),
                        )
                            .into_response()
                    }
                },
            ),
        )
        .route(
            "/2010-04-01/Accounts/{file}",
            get(|Path(file): Path<String>| async move {
                if file == "AC123.json" {
                    (StatusCode::OK, Json(json!({"sid": "AC123"}))).into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"code": 20003, "message": "Authenticate", "status": 401})),
                    )
                        .into_response()
                }
            }),
        )
        .with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}"), recorded)
}

fn client(base: &str, sid: &str) -> TwilioClient {
    TwilioClient::new(&GatewayConfig {
        account_sid: sid.into(),
        auth_token: SecretString::from("token"),
        from_number: Some("+15005550006".into()),
        api_base: base.into(),
    })
}

fn sms() -> OutboundSms {
    OutboundSms {
        body: "Test SMS message".into(),
        from: Some("+15005550006".into()),
        to: "+573001234567".into(),
    }
}

#[tokio::test]
async fn send_posts_form_and_returns_sid() {
    timeout(TEST_TIMEOUT, async {
        let (base, recorded) = start_stub(false).await;
        let sent = client(&base, "AC123").send(&sms()).await.unwrap();
        assert_eq!(sent.external_id.as_deref(), Some("SM123456789"));

        let forms = recorded.forms.lock().unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0]["Body"], "Test SMS message");
        assert_eq!(forms[0]["From"], "+15005550006");
        assert_eq!(forms[0]["To"], "+573001234567");

        let auth = recorded.auth.lock().unwrap();
        assert!(auth[0].as_deref().unwrap().starts_with("Basic "));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn send_without_sender_omits_from() {
    timeout(TEST_TIMEOUT, async {
        let (base, recorded) = start_stub(false).await;
        let mut message = sms();
        message.from = None;
        client(&base, "AC123").send(&message).await.unwrap();

        let forms = recorded.forms.lock().unwrap();
        assert!(!forms[0].contains_key("From"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn api_error_becomes_provider_error() {
    timeout(TEST_TIMEOUT, async {
        let (base, _recorded) = start_stub(true).await;
        let err = client(&base, "AC123").send(&sms()).await.unwrap_err();
        match err {
            GatewayError::Provider {
                status,
                code,
                message,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(21211));
                assert!(message.contains("not a valid phone number"));
            }
            other => panic!("Expected Provider error, got {:?}", other),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn account_check_succeeds_for_known_account() {
    timeout(TEST_TIMEOUT, async {
        let (base, _recorded) = start_stub(false).await;
        assert!(client(&base, "AC123").check_account().await.is_ok());

        let err = client(&base, "ACnope").check_account().await.unwrap_err();
        assert!(err.is_provider_error());
    })
    .await
    .expect("test timed out");
}
