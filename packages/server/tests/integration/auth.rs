use chrono::{Duration, Utc};
use futures::future::join_all;
use sea_orm::prelude::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use review_server::entity::{confirmation_code, role::Role};

use crate::common::{TestApp, routes};

mod signup {
    use super::*;

    #[tokio::test]
    async fn new_user_receives_a_code_by_mail() {
        let app = TestApp::spawn().await;

        let res = app.signup("alice", "alice@example.com").await;

        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["email"], "alice@example.com");
        assert_eq!(app.mailer.sent().len(), 1);
        assert_eq!(app.code_sent_to("alice@example.com").len(), 6);
    }

    #[tokio::test]
    async fn reserved_username_me_is_rejected_in_any_case() {
        let app = TestApp::spawn().await;

        for name in ["me", "ME", "Me"] {
            let res = app
                .post_without_token(
                    routes::SIGNUP,
                    &json!({"username": name, "email": "me@example.com"}),
                )
                .await;

            assert_eq!(res.status, 400, "{name} was accepted");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
            assert_eq!(res.body["field"], "username");
        }
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "not-an-email"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "email");
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app.post_raw(routes::SIGNUP, r#"{"username": "alice""#).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn taken_username_with_other_email_conflicts() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "other@example.com"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn taken_email_with_other_username_conflicts() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "bob", "email": "alice@example.com"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn repeating_signup_reissues_and_invalidates_the_old_code() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let first = app.code_sent_to("alice@example.com");

        app.signup("alice", "alice@example.com").await;
        let second = app.code_sent_to("alice@example.com");
        assert_eq!(app.mailer.sent().len(), 2);

        if first != second {
            let res = app.exchange_code("alice", &first).await;
            assert_eq!(res.status, 400);
            assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");
        }

        let res = app.exchange_code("alice", &second).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }
}

mod token {
    use super::*;

    #[tokio::test]
    async fn valid_code_yields_a_token_pair() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");

        let res = app.exchange_code("alice", &code).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["token_type"], "Bearer");
        let access = res.body["access"].as_str().unwrap();
        assert!(res.body["refresh"].is_string());

        let me = app.get_with_token(routes::ME, access).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["username"], "alice");
        assert_eq!(me.body["role"], "user");
    }

    #[tokio::test]
    async fn code_can_be_used_only_once() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");

        let first = app.exchange_code("alice", &code).await;
        assert_eq!(first.status, 200);

        let second = app.exchange_code("alice", &code).await;
        assert_eq!(second.status, 400);
        assert_eq!(second.body["code"], "INVALID_CONFIRMATION_CODE");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_exchanges_spend_the_code_once() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");

        let responses =
            join_all((0..10).map(|_| app.exchange_code("alice", &code))).await;

        let mut statuses: Vec<u16> = responses.iter().map(|r| r.status).collect();
        statuses.sort_unstable();
        assert_eq!(statuses[0], 200, "{statuses:?}");
        assert!(statuses[1..].iter().all(|&s| s == 400), "{statuses:?}");

        let consumed = confirmation_code::Entity::find()
            .filter(confirmation_code::Column::ConsumedAt.is_not_null())
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(consumed, 1);
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let res = app.exchange_code("alice", wrong).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");
        assert_eq!(res.body["field"], "confirmation_code");
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");

        confirmation_code::Entity::update_many()
            .col_expr(
                confirmation_code::Column::ExpiresAt,
                Expr::value(Utc::now() - Duration::minutes(1)),
            )
            .filter(confirmation_code::Column::ConsumedAt.is_null())
            .exec(&app.db)
            .await
            .unwrap();

        let res = app.exchange_code("alice", &code).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.exchange_code("ghost", "123456").await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn code_is_stored_hashed() {
        let app = TestApp::spawn().await;
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");

        let stored = confirmation_code::Entity::find()
            .one(&app.db)
            .await
            .unwrap()
            .unwrap();

        assert_ne!(stored.code_hash, code);
        assert!(stored.code_hash.starts_with("$argon2"));
    }
}

mod refresh {
    use super::*;

    async fn token_pair(app: &TestApp) -> (String, String) {
        app.signup("alice", "alice@example.com").await;
        let code = app.code_sent_to("alice@example.com");
        let res = app.exchange_code("alice", &code).await;
        (
            res.body["access"].as_str().unwrap().to_string(),
            res.body["refresh"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn refresh_token_yields_a_working_access_token() {
        let app = TestApp::spawn().await;
        let (_, refresh) = token_pair(&app).await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh": refresh}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let access = res.body["access"].as_str().unwrap();
        let me = app.get_with_token(routes::ME, access).await;
        assert_eq!(me.status, 200);
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let app = TestApp::spawn().await;
        let (access, _) = token_pair(&app).await;

        let res = app
            .post_without_token(routes::REFRESH, &json!({"refresh": access}))
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_bearer() {
        let app = TestApp::spawn().await;
        let (_, refresh) = token_pair(&app).await;

        let res = app.get_with_token(routes::ME, &refresh).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }
}

mod bearer {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::ME, "not-a-jwt").await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn role_change_applies_to_existing_tokens() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let denied = app.get_with_token(routes::USERS, &token).await;
        assert_eq!(denied.status, 403);

        app.set_role("alice", Role::Admin).await;

        let allowed = app.get_with_token(routes::USERS, &token).await;
        assert_eq!(allowed.status, 200, "{}", allowed.text);
    }
}
