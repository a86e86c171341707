use client::auth::{
    AuthError, CognitoIdentityProvider, Credentials, IdentityConfig,
    IdentityProvider, NewAccount,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

fn provider(server: &MockServer) -> CognitoIdentityProvider {
    CognitoIdentityProvider::new(&IdentityConfig {
        region: "us-east-1".into(),
        user_pool_client_id: "pool-client".into(),
        endpoint: Some(server.uri()),
    })
}

fn target(action: &str) -> String {
    format!("AWSCognitoIdentityProviderService.{action}")
}

#[tokio::test]
async fn sign_in_uses_password_auth() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Amz-Target", target("InitiateAuth").as_str()))
        .and(header("Content-Type", CONTENT_TYPE))
        .and(body_partial_json(json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": "pool-client",
            "AuthParameters": {"USERNAME": "a@example.com", "PASSWORD": "pw"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": {
                "AccessToken": "access",
                "IdToken": "id",
                "RefreshToken": "refresh",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            },
            "ChallengeParameters": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = provider(&server)
        .sign_in(&Credentials {
            email: "a@example.com".into(),
            password: SecretString::from("pw"),
        })
        .await?;

    assert_eq!(tokens.access_token.expose_secret(), "access");
    assert_eq!(tokens.id_token.expose_secret(), "id");
    assert_eq!(tokens.refresh_token.expose_secret(), "refresh");
    Ok(())
}

#[tokio::test]
async fn provider_errors_map_to_auth_errors() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("InitiateAuth").as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "UserNotConfirmedException",
            "message": "User is not confirmed."
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("SignUp").as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "InvalidPasswordException",
            "message": "Password did not conform with policy"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("ConfirmSignUp").as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ExpiredCodeException",
            "message": "Invalid code provided, please request a code again."
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("ForgotPassword").as_str()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "LimitExceededException",
            "message": "Attempt limit exceeded"
        })))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let result = provider
        .sign_in(&Credentials {
            email: "a@example.com".into(),
            password: SecretString::from("pw"),
        })
        .await;
    assert!(matches!(result, Err(AuthError::UserNotConfirmed)));

    let result = provider
        .sign_up(&NewAccount {
            email: "a@example.com".into(),
            password: SecretString::from("weakpass"),
        })
        .await;
    match result {
        Err(AuthError::InvalidPassword(message)) => {
            assert_eq!(message, "Password did not conform with policy")
        }
        other => panic!("Expected invalid password, got {other:?}"),
    }

    let result = provider.confirm_sign_up("a@example.com", "123456").await;
    assert!(matches!(result, Err(AuthError::ExpiredCode)));

    let result = provider.forgot_password("a@example.com").await;
    assert!(matches!(result, Err(AuthError::LimitExceeded)));
    Ok(())
}

#[tokio::test]
async fn sign_up_reports_code_destination() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("SignUp").as_str()))
        .and(body_partial_json(json!({
            "ClientId": "pool-client",
            "Username": "a@example.com",
            "UserAttributes": [{"Name": "email", "Value": "a@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "UserConfirmed": false,
            "UserSub": "0f1e2d3c",
            "CodeDeliveryDetails": {
                "AttributeName": "email",
                "DeliveryMedium": "EMAIL",
                "Destination": "a***@e***"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server)
        .sign_up(&NewAccount {
            email: "a@example.com".into(),
            password: SecretString::from("long-enough"),
        })
        .await?;

    assert!(!result.user_confirmed);
    assert_eq!(result.user_sub.as_deref(), Some("0f1e2d3c"));
    assert_eq!(result.code_destination.as_deref(), Some("a***@e***"));
    Ok(())
}

#[tokio::test]
async fn confirmation_actions_accept_empty_bodies() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    for action in ["ConfirmSignUp", "ConfirmForgotPassword"] {
        Mock::given(method("POST"))
            .and(header("X-Amz-Target", target(action).as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", target("ResendConfirmationCode").as_str()))
        .and(body_partial_json(json!({"Username": "a@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "CodeDeliveryDetails": {"Destination": "a***@e***"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider(&server);
    provider.confirm_sign_up("a@example.com", "123456").await?;
    provider
        .confirm_forgot_password(
            "a@example.com",
            "654321",
            &SecretString::from("brand-new-pass"),
        )
        .await?;
    provider.resend_confirmation_code("a@example.com").await?;
    Ok(())
}
