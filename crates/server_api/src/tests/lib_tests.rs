use super::*;
use shared::board::{ContainerId, DropTarget, Tier};

async fn test_ctx() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext { storage }
}

#[tokio::test]
async fn fetch_board_serves_default_until_first_save() {
    let ctx = test_ctx().await;

    let record = fetch_board(&ctx, "Default", None).await.expect("fetch");
    assert_eq!(record.id, None);
    assert_eq!(record.board, Board::default());

    let moved = record
        .board
        .reassign("Bob", &DropTarget::Container(ContainerId::Tier("A".into())))
        .expect("move");
    save_board(&ctx, "Default", None, &moved, 1)
        .await
        .expect("save");

    let record = fetch_board(&ctx, "Default", None).await.expect("fetch");
    assert!(record.id.is_some());
    assert_eq!(record.board, moved);
    assert_eq!(record.seq, 1);
}

#[tokio::test]
async fn save_board_rejects_blank_and_duplicate_tier_ids() {
    let ctx = test_ctx().await;

    let blank = Board {
        tiers: vec![Tier::new("  ")],
        bin: vec![],
    };
    let err = save_board(&ctx, "Default", None, &blank, 0)
        .await
        .expect_err("blank tier id");
    assert_eq!(err.code, ErrorCode::Validation);

    let duplicated = Board {
        tiers: vec![Tier::new("S"), Tier::new("S")],
        bin: vec![],
    };
    let err = save_board(&ctx, "Default", None, &duplicated, 0)
        .await
        .expect_err("duplicate tier id");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn fetch_board_requires_classmate_name() {
    let ctx = test_ctx().await;
    let err = fetch_board(&ctx, "  ", None).await.expect_err("blank name");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn reset_board_reports_removed_rows() {
    let ctx = test_ctx().await;
    save_board(&ctx, "Default", None, &Board::default(), 0)
        .await
        .expect("save");

    assert_eq!(reset_board(&ctx, "Default", None).await.expect("reset"), 1);
    assert_eq!(reset_board(&ctx, "Default", None).await.expect("reset"), 0);
}

#[tokio::test]
async fn post_comment_rejects_whitespace_only_text() {
    let ctx = test_ctx().await;
    let author = ctx.storage.create_user("alice").await.expect("user");

    let err = post_comment(&ctx, author, "S", "Default", "   \n\t ")
        .await
        .expect_err("whitespace comment");
    assert_eq!(err.code, ErrorCode::Validation);

    // Markup-only content is empty after sanitization.
    let err = post_comment(&ctx, author, "S", "Default", "<b></b>")
        .await
        .expect_err("markup-only comment");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn post_comment_strips_embedded_markup() {
    let ctx = test_ctx().await;
    let author = ctx.storage.create_user("alice").await.expect("user");

    let created = post_comment(
        &ctx,
        author,
        "S",
        "Default",
        "  <script>alert(1)</script>great pick!  ",
    )
    .await
    .expect("comment");
    assert_eq!(created.content, "alert(1)great pick!");
    assert_eq!(created.author_name, "alice");

    let listed = list_comments(&ctx, "S", "Default").await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "alert(1)great pick!");
}

#[tokio::test]
async fn list_comments_requires_both_parameters() {
    let ctx = test_ctx().await;
    let err = list_comments(&ctx, "", "Default")
        .await
        .expect_err("missing tier id");
    assert_eq!(err.code, ErrorCode::Validation);
    let err = list_comments(&ctx, "S", "")
        .await
        .expect_err("missing classmate name");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[test]
fn sanitize_strips_tags_and_trims() {
    assert_eq!(sanitize_comment_text("plain"), "plain");
    assert_eq!(sanitize_comment_text(" <i>hi</i> "), "hi");
    assert_eq!(sanitize_comment_text("a <unclosed"), "a");
    assert_eq!(sanitize_comment_text("<br/>"), "");
}
