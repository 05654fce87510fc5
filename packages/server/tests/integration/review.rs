use futures::future::join_all;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use review_server::entity::{review, role::Role};

use crate::common::{TestApp, captured_logs, routes};

/// An admin token and a fresh title id.
async fn setup(app: &TestApp) -> (String, i32) {
    let admin = app.create_user_with_role("root", Role::Admin).await;
    let title_id = app.create_title(&admin, "Solaris", 1972, &[], None).await;
    (admin, title_id)
}

mod create {
    use super::*;

    #[tokio::test]
    async fn authenticated_user_reviews_a_title() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(
                &routes::reviews(title_id),
                &json!({"text": "Hypnotic.", "score": 9}),
                &alice,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["author"], "alice");
        assert_eq!(res.body["title_id"], title_id);
        assert_eq!(res.body["score"], 9);
        assert!(res.body["pub_date"].is_string());
    }

    #[tokio::test]
    async fn second_review_of_the_same_title_conflicts() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        app.create_review(&alice, title_id, 8).await;

        let res = app
            .post_with_token(
                &routes::reviews(title_id),
                &json!({"text": "Again.", "score": 3}),
                &alice,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        let list = app.get_without_token(&routes::reviews(title_id)).await;
        assert_eq!(list.body["pagination"]["total"], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_reviews_by_one_author_leave_a_single_row() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let path = routes::reviews(title_id);
        let body = json!({"text": "Once.", "score": 8});

        let responses =
            join_all((0..16).map(|_| app.post_with_token(&path, &body, &alice))).await;

        let created = responses.iter().filter(|r| r.status == 201).count();
        let conflicts = responses
            .iter()
            .filter(|r| r.status == 409 && r.body["code"] == "CONFLICT")
            .count();
        assert_eq!(created, 1);
        assert_eq!(conflicts, 15);

        let rows = review::Entity::find()
            .filter(review::Column::TitleId.eq(title_id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn score_bounds_are_inclusive() {
        let app = TestApp::spawn().await;
        let (admin, title_id) = setup(&app).await;
        let other = app.create_title(&admin, "Stalker", 1979, &[], None).await;
        let alice = app.create_authenticated_user("alice").await;

        for score in [0, 11] {
            let res = app
                .post_with_token(
                    &routes::reviews(title_id),
                    &json!({"text": "Hm.", "score": score}),
                    &alice,
                )
                .await;
            assert_eq!(res.status, 400, "score {score} accepted");
            assert_eq!(res.body["field"], "score");
        }

        app.create_review(&alice, title_id, 1).await;
        app.create_review(&alice, other, 10).await;
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(
                &routes::reviews(title_id),
                &json!({"text": "   ", "score": 5}),
                &alice,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["field"], "text");
    }

    #[tokio::test]
    async fn anonymous_review_is_unauthorized() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;

        let res = app
            .post_without_token(
                &routes::reviews(title_id),
                &json!({"text": "Hi.", "score": 5}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn reviewing_a_missing_title_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(&routes::reviews(9999), &json!({"text": "Hi.", "score": 5}), &alice)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn anyone_lists_and_reads_reviews() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let first = app.create_review(&alice, title_id, 6).await;
        app.create_review(&bob, title_id, 7).await;

        let list = app.get_without_token(&routes::reviews(title_id)).await;
        assert_eq!(list.status, 200);
        assert_eq!(list.body["pagination"]["total"], 2);
        assert_eq!(list.body["data"][0]["author"], "bob");

        let detail = app
            .get_without_token(&routes::review(title_id, first))
            .await;
        assert_eq!(detail.status, 200);
        assert_eq!(detail.body["author"], "alice");
    }

    #[tokio::test]
    async fn review_is_only_reachable_through_its_title() {
        let app = TestApp::spawn().await;
        let (admin, title_id) = setup(&app).await;
        let other = app.create_title(&admin, "Stalker", 1979, &[], None).await;
        let alice = app.create_authenticated_user("alice").await;
        let review_id = app.create_review(&alice, title_id, 6).await;

        let res = app
            .get_without_token(&routes::review(other, review_id))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn handler_spans_record_path_ids() {
        let logs = captured_logs();
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;

        let res = app
            .get_without_token(&routes::review(title_id, 424_242))
            .await;
        assert_eq!(res.status, 404);

        let comments = app
            .get_without_token(&routes::comment(title_id, 424_243, 7))
            .await;
        assert_eq!(comments.status, 404);

        let text = logs.contents();
        assert!(text.contains("get_review{"), "{text}");
        assert!(text.contains("review_id=424242"), "{text}");
        assert!(text.contains(&format!("title_id={title_id}")), "{text}");
        assert!(text.contains("review_id=424243 comment_id=7"), "{text}");
    }
}

mod modify {
    use super::*;

    #[tokio::test]
    async fn author_edits_own_review() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let review_id = app.create_review(&alice, title_id, 6).await;

        let res = app
            .patch_with_token(&routes::review(title_id, review_id), &json!({"score": 8}), &alice)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["score"], 8);
        assert_eq!(res.body["text"], "Worth seeing.");

        let title = app.get_without_token(&routes::title(title_id)).await;
        assert_eq!(title.body["rating"], 8.0);
    }

    #[tokio::test]
    async fn other_plain_user_cannot_edit_or_delete() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let review_id = app.create_review(&alice, title_id, 6).await;
        let path = routes::review(title_id, review_id);

        let patch = app.patch_with_token(&path, &json!({"score": 1}), &bob).await;
        assert_eq!(patch.status, 403);
        assert_eq!(patch.body["code"], "PERMISSION_DENIED");

        let delete = app.delete_with_token(&path, &bob).await;
        assert_eq!(delete.status, 403);

        let unchanged = app.get_without_token(&path).await;
        assert_eq!(unchanged.body["score"], 6);
    }

    #[tokio::test]
    async fn moderator_and_admin_moderate_any_review() {
        let app = TestApp::spawn().await;
        let (admin, title_id) = setup(&app).await;
        let moderator = app.create_user_with_role("mod", Role::Moderator).await;
        let alice = app.create_authenticated_user("alice").await;
        let review_id = app.create_review(&alice, title_id, 6).await;
        let path = routes::review(title_id, review_id);

        let edited = app
            .patch_with_token(&path, &json!({"text": "[removed]"}), &moderator)
            .await;
        assert_eq!(edited.status, 200, "{}", edited.text);
        assert_eq!(edited.body["author"], "alice");

        let deleted = app.delete_with_token(&path, &admin).await;
        assert_eq!(deleted.status, 204);
    }

    #[tokio::test]
    async fn deleting_a_review_removes_its_comments_and_rating_share() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let review_id = app.create_review(&alice, title_id, 6).await;
        app.create_comment(&alice, title_id, review_id).await;

        let res = app
            .delete_with_token(&routes::review(title_id, review_id), &alice)
            .await;
        assert_eq!(res.status, 204);

        let comments = app
            .get_without_token(&routes::comments(title_id, review_id))
            .await;
        assert_eq!(comments.status, 404);

        let title = app.get_without_token(&routes::title(title_id)).await;
        assert!(title.body["rating"].is_null());

        let again = app.create_review(&alice, title_id, 9).await;
        assert_ne!(again, review_id);
    }

    #[tokio::test]
    async fn anonymous_delete_is_unauthorized() {
        let app = TestApp::spawn().await;
        let (_, title_id) = setup(&app).await;
        let alice = app.create_authenticated_user("alice").await;
        let review_id = app.create_review(&alice, title_id, 6).await;

        let res = app
            .delete_without_token(&routes::review(title_id, review_id))
            .await;

        assert_eq!(res.status, 401);
    }
}
