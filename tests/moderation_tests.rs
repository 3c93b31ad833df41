use blog_backend::{
    InMemoryRepository,
    auth::AuthUser,
    blogs,
    comment_tree::{MAX_REPLY_DEPTH, count_nodes},
    error::AppError,
    models::{BlogRequest, CreateCommentRequest, NewBlog, NewUser, User},
    moderation::{self, ALREADY_MODERATED},
    notifications::{self, PREVIEW_CHARS},
    repository::Repository,
    roles::Role,
};

// --- Fixtures ---

async fn seed_user(repo: &InMemoryRepository, name: &str, role: Role) -> AuthUser {
    let user: User = repo
        .create_user(NewUser {
            name: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "not-a-real-hash".to_string(),
            role,
        })
        .await
        .unwrap();
    user.into()
}

async fn seed_blog(repo: &InMemoryRepository, owner: &AuthUser, title: &str) -> i64 {
    repo.create_blog(NewBlog {
        title: title.to_string(),
        body: "body".to_string(),
        user_id: owner.id,
        photo_id: None,
        category_names: vec![],
    })
    .await
    .unwrap()
    .id
}

fn comment(content: &str, parent_id: Option<i64>) -> CreateCommentRequest {
    CreateCommentRequest {
        content: content.to_string(),
        parent_id,
    }
}

// --- Creation ---

#[tokio::test]
async fn test_new_comment_starts_unmoderated_without_notification() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;

    let created = moderation::create_comment(&repo, &alice, blog_id, comment("  hi  ", None))
        .await
        .unwrap();

    assert!(!created.is_moderated);
    assert_eq!(created.content, "hi");
    assert_eq!(created.user_id, alice.id);
    assert!(repo.notifications_for_user(alice.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reply_notifies_parent_author_with_preview_and_title() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let bob = seed_user(&repo, "bob", Role::User).await;
    let blog_id = seed_blog(&repo, &alice, "Baking Bread").await;

    let parent = moderation::create_comment(&repo, &alice, blog_id, comment("first", None))
        .await
        .unwrap();
    let long_reply = "x".repeat(PREVIEW_CHARS + 20);
    let reply = moderation::create_comment(
        &repo,
        &bob,
        blog_id,
        comment(&long_reply, Some(parent.id)),
    )
    .await
    .unwrap();

    let inbox = notifications::list_for_user(&repo, alice.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].comment_id, Some(reply.id));
    assert!(inbox[0].content.contains("bob"));
    assert!(inbox[0].content.contains("Baking Bread"));
    assert!(inbox[0].content.contains(&"x".repeat(PREVIEW_CHARS)));
    assert!(!inbox[0].content.contains(&"x".repeat(PREVIEW_CHARS + 1)));
}

#[tokio::test]
async fn test_empty_content_is_a_validation_error() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;

    let err = moderation::create_comment(&repo, &alice, blog_id, comment("   ", None))
        .await
        .unwrap_err();

    match err {
        AppError::Validation(issues) => assert_eq!(issues[0].field, "content"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_parent_fails_before_any_write() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;

    let err = moderation::create_comment(&repo, &alice, blog_id, comment("hi", Some(4242)))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(repo.comments_for_blog(blog_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reply_beyond_max_depth_is_rejected() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;

    let mut parent = None;
    for level in 1..=MAX_REPLY_DEPTH {
        let created = moderation::create_comment(
            &repo,
            &alice,
            blog_id,
            comment(&format!("level {level}"), parent),
        )
        .await
        .unwrap();
        parent = Some(created.id);
    }

    let err = moderation::create_comment(&repo, &alice, blog_id, comment("too deep", parent))
        .await
        .unwrap_err();
    match err {
        AppError::Validation(issues) => assert_eq!(issues[0].field, "parent_id"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let stored = repo.comments_for_blog(blog_id).await.unwrap();
    assert_eq!(stored.len(), MAX_REPLY_DEPTH);

    let forest = moderation::list_comments(&repo, blog_id, Some(Role::Admin))
        .await
        .unwrap();
    assert_eq!(count_nodes(&forest), MAX_REPLY_DEPTH);
}

#[tokio::test]
async fn test_missing_blog_is_not_found() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;

    let err = moderation::create_comment(&repo, &alice, 999, comment("hi", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_parent_from_another_blog_is_rejected() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let first = seed_blog(&repo, &alice, "one").await;
    let second = seed_blog(&repo, &alice, "two").await;

    let parent = moderation::create_comment(&repo, &alice, first, comment("p", None))
        .await
        .unwrap();
    let err = moderation::create_comment(&repo, &alice, second, comment("r", Some(parent.id)))
        .await
        .unwrap_err();

    match err {
        AppError::Validation(issues) => assert_eq!(issues[0].field, "parent_id"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(repo.comments_for_blog(second).await.unwrap().is_empty());
}

// --- Moderation ---

#[tokio::test]
async fn test_moderating_twice_is_a_conflict() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let mod_ = seed_user(&repo, "mod", Role::Moderator).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;
    let c = moderation::create_comment(&repo, &alice, blog_id, comment("hi", None))
        .await
        .unwrap();

    let first = moderation::moderate_comment(&repo, &mod_, c.id).await.unwrap();
    assert!(first.is_moderated);

    match moderation::moderate_comment(&repo, &mod_, c.id).await {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, ALREADY_MODERATED),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_only_staff_can_moderate() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let admin = seed_user(&repo, "root", Role::Admin).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;
    let c = moderation::create_comment(&repo, &alice, blog_id, comment("hi", None))
        .await
        .unwrap();

    let err = moderation::moderate_comment(&repo, &alice, c.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));
    assert!(!repo.get_comment(c.id).await.unwrap().unwrap().is_moderated);

    assert!(moderation::moderate_comment(&repo, &admin, c.id).await.is_ok());
}

#[tokio::test]
async fn test_moderating_missing_comment_is_not_found() {
    let repo = InMemoryRepository::default();
    let admin = seed_user(&repo, "root", Role::Admin).await;

    let err = moderation::moderate_comment(&repo, &admin, 77)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_moderation_has_exactly_one_winner() {
    let repo = InMemoryRepository::default();
    let alice = seed_user(&repo, "alice", Role::User).await;
    let mod_ = seed_user(&repo, "mod", Role::Moderator).await;
    let blog_id = seed_blog(&repo, &alice, "T").await;
    let c = moderation::create_comment(&repo, &alice, blog_id, comment("hi", None))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        moderation::moderate_comment(&repo, &mod_, c.id),
        moderation::moderate_comment(&repo, &mod_, c.id),
    );

    let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        [a, b]
            .into_iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_))))
    );
}

// --- Deletion ---

#[tokio::test]
async fn test_moderator_removal_notifies_author_and_purges_linked_notifications() {
    let repo = InMemoryRepository::default();
    let u = seed_user(&repo, "u", Role::User).await;
    let other = seed_user(&repo, "other", Role::User).await;
    let m = seed_user(&repo, "m", Role::Moderator).await;
    let blog_id = seed_blog(&repo, &other, "T").await;

    let target = moderation::create_comment(&repo, &u, blog_id, comment("spam", None))
        .await
        .unwrap();
    // A reply to `target` leaves a notification for `u` that points at the reply.
    moderation::create_comment(&repo, &other, blog_id, comment("reply", Some(target.id)))
        .await
        .unwrap();
    assert_eq!(repo.notifications_for_user(u.id).await.unwrap().len(), 1);

    moderation::delete_comment(&repo, &m, target.id).await.unwrap();

    let inbox = repo.notifications_for_user(u.id).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].content.contains("\"T\""));
    assert!(inbox[0].content.contains("removed"));
    assert_eq!(inbox[0].comment_id, None);

    // Replies go with their parent.
    assert!(repo.comments_for_blog(blog_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_author_deleting_own_comment_sends_no_notice() {
    let repo = InMemoryRepository::default();
    let u = seed_user(&repo, "u", Role::Moderator).await;
    let blog_id = seed_blog(&repo, &u, "T").await;
    let c = moderation::create_comment(&repo, &u, blog_id, comment("mine", None))
        .await
        .unwrap();

    moderation::delete_comment(&repo, &u, c.id).await.unwrap();

    assert!(repo.notifications_for_user(u.id).await.unwrap().is_empty());
    assert!(repo.get_comment(c.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stranger_cannot_delete_comment() {
    let repo = InMemoryRepository::default();
    let u = seed_user(&repo, "u", Role::User).await;
    let stranger = seed_user(&repo, "stranger", Role::User).await;
    let blog_id = seed_blog(&repo, &u, "T").await;
    let c = moderation::create_comment(&repo, &u, blog_id, comment("mine", None))
        .await
        .unwrap();

    let err = moderation::delete_comment(&repo, &stranger, c.id)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Permission(ref reason) if reason == "insufficient permissions"));
    assert!(repo.get_comment(c.id).await.unwrap().is_some());
}

// --- Listing ---

#[tokio::test]
async fn test_guest_listing_prunes_reply_under_unmoderated_root() {
    let repo = InMemoryRepository::default();
    let u = seed_user(&repo, "u", Role::User).await;
    let m = seed_user(&repo, "m", Role::Moderator).await;
    let blog_id = seed_blog(&repo, &u, "T").await;

    let a = moderation::create_comment(&repo, &u, blog_id, comment("A", None))
        .await
        .unwrap();
    let b = moderation::create_comment(&repo, &u, blog_id, comment("B", Some(a.id)))
        .await
        .unwrap();
    moderation::moderate_comment(&repo, &m, b.id).await.unwrap();

    let guest_view = moderation::list_comments(&repo, blog_id, None).await.unwrap();
    assert!(guest_view.is_empty());

    let user_view = moderation::list_comments(&repo, blog_id, Some(Role::User))
        .await
        .unwrap();
    assert_eq!(user_view.len(), 1);
    assert_eq!(user_view[0].replies[0].id, b.id);
}

#[tokio::test]
async fn test_listing_comments_of_missing_blog_is_not_found() {
    let repo = InMemoryRepository::default();
    let err = moderation::list_comments(&repo, 5, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// --- Blog scenarios around comments ---

#[tokio::test]
async fn test_blog_deletion_permissions_and_cascade() {
    let repo = InMemoryRepository::default();
    let u1 = seed_user(&repo, "u1", Role::User).await;
    let u2 = seed_user(&repo, "u2", Role::User).await;
    let admin = seed_user(&repo, "admin", Role::Admin).await;

    let blog = blogs::create_blog(
        &repo,
        &u1,
        BlogRequest {
            title: "BL".to_string(),
            body: "text".to_string(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    moderation::create_comment(&repo, &u2, blog.id, comment("hi", None))
        .await
        .unwrap();

    match blogs::delete_blog(&repo, &u2, blog.id).await {
        Err(AppError::Permission(reason)) => assert_eq!(reason, "insufficient permissions"),
        other => panic!("expected permission error, got {other:?}"),
    }

    blogs::delete_blog(&repo, &admin, blog.id).await.unwrap();
    assert!(repo.get_blog(blog.id).await.unwrap().is_none());
    assert!(repo.comments_for_blog(blog.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_category_is_an_integrity_error() {
    let repo = InMemoryRepository::default();

    blogs::create_category(&repo, "Cakes").await.unwrap();
    match blogs::create_category(&repo, "Cakes").await {
        Err(AppError::Integrity(msg)) => assert_eq!(msg, "Category already exists."),
        other => panic!("expected integrity error, got {other:?}"),
    }
}
