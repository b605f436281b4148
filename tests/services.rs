mod common;

use common::Harness;
use readlater::config::{Config, ConfigError};
use readlater::models::{Folder, NewRule, RuleAction, RuleActionType};
use readlater::resolvers::{
    self, ArchiveLinkInput, Claims, ErrorCode, SetDeviceTokenInput,
};
use readlater::{device_tokens, library_items, rules, users};

fn new_rule(name: &str) -> NewRule {
    NewRule {
        name: name.to_string(),
        description: None,
        actions: vec![RuleAction {
            action_type: RuleActionType::AddLabel,
            params: vec!["news".to_string()],
        }],
        filter: "from:news@example.com".to_string(),
    }
}

#[test]
fn test_config_names_missing_variable() {
    let mut vars = common::vars("readlater.sqlite");
    vars.remove("PG_HOST");

    let err = Config::from_vars(&vars).unwrap_err();
    assert_eq!(err, ConfigError::Missing("PG_HOST".to_string()));
    assert!(err.to_string().contains("PG_HOST"));
}

#[test]
fn test_config_rejects_bad_number() {
    let mut vars = common::vars("readlater.sqlite");
    vars.insert("PG_POOL_MAX".to_string(), "lots".to_string());

    match Config::from_vars(&vars) {
        Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, "PG_POOL_MAX"),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_archive_round_trip_through_resolver() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;
    let ada = users::ensure_user(&ctx.pool, "ada", "Ada").await.unwrap();
    let item = library_items::create_library_item(ctx, &ada.id, "https://example.com/a", "A")
        .await
        .unwrap();
    let claims = Claims::new(ada.id.clone());

    let success = resolvers::set_link_archived(
        ctx,
        Some(&claims),
        ArchiveLinkInput {
            link_id: item.id.clone(),
            archived: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(success.link_id, item.id);
    assert_eq!(success.message, "Link Archived");

    let archived = library_items::find_library_items(ctx, &ada.id, Some(Folder::Archive))
        .await
        .unwrap();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].saved_at >= item.saved_at);

    resolvers::set_link_archived(
        ctx,
        Some(&claims),
        ArchiveLinkInput {
            link_id: item.id.clone(),
            archived: false,
        },
    )
    .await
    .unwrap();
    let inbox = library_items::find_library_items(ctx, &ada.id, Some(Folder::Inbox))
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);

    assert_eq!(
        harness.analytics.event_names(),
        vec!["link_archived", "link_unarchived"]
    );
}

#[tokio::test]
async fn test_archive_of_foreign_link_is_bad_request() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;
    let ada = users::ensure_user(&ctx.pool, "ada", "Ada").await.unwrap();
    let grace = users::ensure_user(&ctx.pool, "grace", "Grace").await.unwrap();
    let item = library_items::create_library_item(ctx, &ada.id, "https://example.com/a", "A")
        .await
        .unwrap();

    let err = resolvers::set_link_archived(
        ctx,
        Some(&Claims::new(grace.id.clone())),
        ArchiveLinkInput {
            link_id: item.id.clone(),
            archived: true,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.error_codes, vec![ErrorCode::BadRequest]);

    let still = library_items::find_library_item_by_id(ctx, &item.id, &ada.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still.folder, Folder::Inbox);
}

#[tokio::test]
async fn test_rules_are_isolated_per_owner() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;
    let ada = users::ensure_user(&ctx.pool, "ada", "Ada").await.unwrap();
    let grace = users::ensure_user(&ctx.pool, "grace", "Grace").await.unwrap();

    let ada_rule = resolvers::set_rule(ctx, Some(&Claims::new(ada.id.clone())), new_rule("News"))
        .await
        .unwrap()
        .rule;
    rules::create_rule(ctx, &grace.id, new_rule("News")).await.unwrap();

    let err = resolvers::delete_rule(ctx, Some(&Claims::new(grace.id.clone())), &ada_rule.id)
        .await
        .unwrap_err();
    assert_eq!(err.error_codes, vec![ErrorCode::NotFound]);
    assert_eq!(rules::find_rules(ctx, &ada.id).await.unwrap().len(), 1);

    let deleted = resolvers::delete_rule(ctx, Some(&Claims::new(ada.id.clone())), &ada_rule.id)
        .await
        .unwrap();
    assert_eq!(deleted.rule.id, ada_rule.id);
    assert!(rules::find_rules(ctx, &ada.id).await.unwrap().is_empty());
    assert_eq!(rules::find_rules(ctx, &grace.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_device_token_lifecycle() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;
    let ada = users::ensure_user(&ctx.pool, "ada", "Ada").await.unwrap();
    let claims = Claims::new(ada.id.clone());

    let created = resolvers::set_device_token(
        ctx,
        Some(&claims),
        SetDeviceTokenInput {
            id: None,
            token: Some("apns-123".to_string()),
        },
    )
    .await
    .unwrap()
    .device_token;
    assert_eq!(created.token, "apns-123");
    assert_eq!(
        device_tokens::find_device_tokens_by_user_id(ctx, &ada.id)
            .await
            .unwrap()
            .len(),
        1
    );

    let removed = resolvers::set_device_token(
        ctx,
        Some(&claims),
        SetDeviceTokenInput {
            id: Some(created.id.clone()),
            token: None,
        },
    )
    .await
    .unwrap()
    .device_token;
    assert_eq!(removed, created);
    assert!(device_tokens::find_device_tokens_by_user_id(ctx, &ada.id)
        .await
        .unwrap()
        .is_empty());

    let err = resolvers::set_device_token(ctx, Some(&claims), SetDeviceTokenInput::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_codes, vec![ErrorCode::BadRequest]);
}
