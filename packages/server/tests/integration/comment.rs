use serde_json::json;

use review_server::entity::role::Role;

use crate::common::{TestApp, routes};

/// Title and review ids, with an admin token and the review author's token.
async fn setup(app: &TestApp) -> (i32, i32, String, String) {
    let admin = app.create_user_with_role("root", Role::Admin).await;
    let alice = app.create_authenticated_user("alice").await;
    let title_id = app.create_title(&admin, "Solaris", 1972, &[], None).await;
    let review_id = app.create_review(&alice, title_id, 9).await;
    (title_id, review_id, admin, alice)
}

#[tokio::test]
async fn authenticated_user_comments_and_anyone_reads() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, _, _) = setup(&app).await;
    let bob = app.create_authenticated_user("bob").await;

    let res = app
        .post_with_token(
            &routes::comments(title_id, review_id),
            &json!({"text": "Disagree."}),
            &bob,
        )
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["author"], "bob");
    assert_eq!(res.body["review_id"], review_id);
    let comment_id = res.id();

    let list = app
        .get_without_token(&routes::comments(title_id, review_id))
        .await;
    assert_eq!(list.status, 200);
    assert_eq!(list.body["pagination"]["total"], 1);

    let detail = app
        .get_without_token(&routes::comment(title_id, review_id, comment_id))
        .await;
    assert_eq!(detail.status, 200);
    assert_eq!(detail.body["text"], "Disagree.");
}

#[tokio::test]
async fn user_may_comment_more_than_once() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, _, alice) = setup(&app).await;

    app.create_comment(&alice, title_id, review_id).await;
    app.create_comment(&alice, title_id, review_id).await;

    let list = app
        .get_without_token(&routes::comments(title_id, review_id))
        .await;
    assert_eq!(list.body["pagination"]["total"], 2);
}

#[tokio::test]
async fn anonymous_comment_is_unauthorized() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, _, _) = setup(&app).await;

    let res = app
        .post_without_token(
            &routes::comments(title_id, review_id),
            &json!({"text": "Hi."}),
        )
        .await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn only_author_or_staff_modify_a_comment() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, admin, alice) = setup(&app).await;
    let bob = app.create_authenticated_user("bob").await;
    let moderator = app.create_user_with_role("mod", Role::Moderator).await;
    let comment_id = app.create_comment(&alice, title_id, review_id).await;
    let path = routes::comment(title_id, review_id, comment_id);

    let denied = app.patch_with_token(&path, &json!({"text": "x"}), &bob).await;
    assert_eq!(denied.status, 403);

    let own = app
        .patch_with_token(&path, &json!({"text": "Edited."}), &alice)
        .await;
    assert_eq!(own.status, 200, "{}", own.text);
    assert_eq!(own.body["text"], "Edited.");

    let moderated = app
        .patch_with_token(&path, &json!({"text": "[removed]"}), &moderator)
        .await;
    assert_eq!(moderated.status, 200);

    let deleted = app.delete_with_token(&path, &admin).await;
    assert_eq!(deleted.status, 204);

    let gone = app.get_without_token(&path).await;
    assert_eq!(gone.status, 404);
}

#[tokio::test]
async fn comment_is_only_reachable_through_its_review() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, _, alice) = setup(&app).await;
    let bob = app.create_authenticated_user("bob").await;
    let other_review = app.create_review(&bob, title_id, 4).await;
    let comment_id = app.create_comment(&alice, title_id, review_id).await;

    let res = app
        .get_without_token(&routes::comment(title_id, other_review, comment_id))
        .await;

    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn empty_comment_text_is_rejected() {
    let app = TestApp::spawn().await;
    let (title_id, review_id, _, alice) = setup(&app).await;

    let res = app
        .post_with_token(
            &routes::comments(title_id, review_id),
            &json!({"text": ""}),
            &alice,
        )
        .await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["field"], "text");
}
