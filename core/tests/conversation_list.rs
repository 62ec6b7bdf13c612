/// Conversation list tests: masking, unread counts, ordering, live refresh
mod common;

use chrono::{TimeZone, Utc};
use common::{say, seed_business, seed_courier, seed_pair, FlakyBackend};
use kuryelink_core::aggregator::{
    aggregate_conversations, total_unread, AggregateOptions, EMPTY_PREVIEW,
};
use kuryelink_core::inbox::LIST_LOAD_FAILED;
use kuryelink_core::{ChatBackend, Config, Inbox, LocalBackend, Role, UserSession};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_list_masks_counterpart_and_counts_unread() {
    let backend = LocalBackend::temporary().unwrap();
    let pair = seed_pair(&backend).await;
    let conv = pair.conversation.id;

    say(&backend, &pair.courier, conv, "Merhaba").await;
    tokio::time::sleep(Duration::from_millis(2)).await;
    say(&backend, &pair.courier, conv, "Yarın müsaitim").await;

    let business_view = aggregate_conversations(&backend, &pair.business, AggregateOptions::default())
        .await
        .unwrap();
    assert_eq!(business_view.len(), 1);
    let row = &business_view[0];
    assert_eq!(row.conversation_id, conv);
    assert_eq!(row.counterpart_id, pair.courier.user_id);
    assert_eq!(row.counterpart.masked_name, "Ahmet Y.");
    assert_eq!(row.counterpart.role_label, "Kurye");
    assert_eq!(row.unread_count, 2);
    assert_eq!(row.preview, "Yarın müsaitim");
    assert!(!row.is_own_last);

    let courier_view = aggregate_conversations(&backend, &pair.courier, AggregateOptions::default())
        .await
        .unwrap();
    let row = &courier_view[0];
    assert_eq!(row.counterpart.masked_name, "E... H... L...");
    assert_eq!(row.counterpart.role_label, "İşletme");
    assert!(row.counterpart.avatar_url.is_some());
    assert_eq!(row.unread_count, 0);
    assert!(row.is_own_last);
}

#[tokio::test]
async fn test_conversation_without_messages_still_listed() {
    let backend = LocalBackend::temporary().unwrap();
    let pair = seed_pair(&backend).await;

    let rows = aggregate_conversations(&backend, &pair.business, AggregateOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].preview, EMPTY_PREVIEW);
    assert!(rows[0].last_message.is_none());
    assert_eq!(rows[0].last_activity, pair.conversation.updated_at);
    assert_eq!(rows[0].unread_count, 0);
}

#[tokio::test]
async fn test_list_orders_by_latest_activity() {
    let backend = LocalBackend::temporary().unwrap();
    let business = seed_business(&backend, "Kadıköy Döner").await;
    let c1_courier = seed_courier(&backend, "Ali", "Veli").await;
    let c2_courier = seed_courier(&backend, "Ayşe", "Kaya").await;

    let c1 = backend
        .create_conversation(business.user_id, c1_courier.user_id)
        .await
        .unwrap();
    let c2 = backend
        .create_conversation(business.user_id, c2_courier.user_id)
        .await
        .unwrap();

    let ten = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();
    let eleven = Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap();
    backend.touch_conversation(c1.id, ten).await.unwrap();
    backend.touch_conversation(c2.id, eleven).await.unwrap();

    let rows = aggregate_conversations(&backend, &business, AggregateOptions::default())
        .await
        .unwrap();
    let order: Vec<Uuid> = rows.iter().map(|r| r.conversation_id).collect();
    assert_eq!(order, vec![c2.id, c1.id]);

    // A new message in C1 moves it to the top
    say(&backend, &c1_courier, c1.id, "Hâlâ iş var mı?").await;
    let rows = aggregate_conversations(&backend, &business, AggregateOptions::default())
        .await
        .unwrap();
    let order: Vec<Uuid> = rows.iter().map(|r| r.conversation_id).collect();
    assert_eq!(order, vec![c1.id, c2.id]);

    for window in rows.windows(2) {
        assert!(window[0].last_activity >= window[1].last_activity);
    }
}

#[tokio::test]
async fn test_missing_profile_uses_placeholder_identity() {
    let backend = LocalBackend::temporary().unwrap();
    let business = seed_business(&backend, "Pide Salonu").await;
    let ghost_courier = Uuid::new_v4();
    backend
        .create_conversation(business.user_id, ghost_courier)
        .await
        .unwrap();

    let rows = aggregate_conversations(&backend, &business, AggregateOptions::default())
        .await
        .unwrap();
    assert_eq!(rows[0].counterpart.masked_name, "Kurye");
    assert!(rows[0].counterpart.avatar_url.is_none());
}

#[tokio::test]
async fn test_outsiders_and_wrong_roles_see_nothing() {
    let backend = LocalBackend::temporary().unwrap();
    let pair = seed_pair(&backend).await;

    let stranger = UserSession::new(Uuid::new_v4(), Role::Business);
    let rows = aggregate_conversations(&backend, &stranger, AggregateOptions::default())
        .await
        .unwrap();
    assert!(rows.is_empty());

    let wrong_role = UserSession::new(pair.courier.user_id, Role::Business);
    let rows = aggregate_conversations(&backend, &wrong_role, AggregateOptions::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_total_unread_and_preview_truncation() {
    let backend = LocalBackend::temporary().unwrap();
    let business = seed_business(&backend, "Engin Has Lahmacun").await;
    let first = seed_courier(&backend, "Can", "Işık").await;
    let second = seed_courier(&backend, "Elif", "Demir").await;

    let c1 = backend
        .create_conversation(business.user_id, first.user_id)
        .await
        .unwrap();
    let c2 = backend
        .create_conversation(business.user_id, second.user_id)
        .await
        .unwrap();
    say(&backend, &first, c1.id, "bir").await;
    say(&backend, &second, c2.id, "iki").await;
    say(&backend, &second, c2.id, "Akşam vardiyası için yedi buçukta orada olabilirim").await;

    let options = AggregateOptions {
        preview_max_chars: 10,
    };
    let rows = aggregate_conversations(&backend, &business, options).await.unwrap();
    assert_eq!(total_unread(&rows), 3);

    let c2_row = rows.iter().find(|r| r.conversation_id == c2.id).unwrap();
    assert_eq!(c2_row.preview, "Akşam var…");
    assert_eq!(
        c2_row.last_message.as_ref().unwrap().content,
        "Akşam vardiyası için yedi buçukta orada olabilirim"
    );
}

#[tokio::test]
async fn test_inbox_refreshes_on_live_change() {
    let backend = Arc::new(LocalBackend::temporary().unwrap());
    let pair = seed_pair(backend.as_ref()).await;

    let inbox = Inbox::open(backend.clone(), pair.business, &Config::default()).await;
    assert_eq!(inbox.total_unread(), 0);
    assert!(!inbox.drain_pending().await);

    say(backend.as_ref(), &pair.courier, pair.conversation.id, "Merhaba").await;

    assert!(inbox.drain_pending().await);
    assert_eq!(inbox.total_unread(), 1);
    assert_eq!(inbox.summaries()[0].preview, "Merhaba");

    // process_next wakes up for a change published after it starts waiting
    let courier = pair.courier;
    let conv = pair.conversation.id;
    let writer = backend.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        say(writer.as_ref(), &courier, conv, "Orada mısınız?").await;
    });
    let woke = tokio::time::timeout(Duration::from_secs(2), inbox.process_next())
        .await
        .unwrap();
    assert!(woke);
    handle.await.unwrap();
    assert_eq!(inbox.total_unread(), 2);

    let before = backend.feed().subscriber_count();
    inbox.close().await;
    assert_eq!(backend.feed().subscriber_count(), before - 1);
}

#[tokio::test]
async fn test_inbox_keeps_previous_list_when_refresh_fails() {
    let backend = Arc::new(FlakyBackend::new());
    let pair = seed_pair(backend.as_ref()).await;

    let inbox = Inbox::open(backend.clone(), pair.business, &Config::default()).await;
    assert_eq!(inbox.summaries().len(), 1);
    assert!(inbox.last_error().is_none());

    backend.fail_reads.store(true, Ordering::SeqCst);
    assert!(inbox.refresh().await.is_err());
    assert_eq!(inbox.last_error().as_deref(), Some(LIST_LOAD_FAILED));
    assert_eq!(inbox.summaries().len(), 1);

    backend.fail_reads.store(false, Ordering::SeqCst);
    inbox.refresh().await.unwrap();
    assert!(inbox.last_error().is_none());
}

#[tokio::test]
async fn test_inbox_open_survives_load_failure() {
    let backend = Arc::new(FlakyBackend::new());
    let pair = seed_pair(backend.as_ref()).await;
    backend.fail_reads.store(true, Ordering::SeqCst);

    let inbox = Inbox::open(backend.clone(), pair.courier, &Config::default()).await;
    assert!(inbox.summaries().is_empty());
    assert_eq!(inbox.last_error().as_deref(), Some(LIST_LOAD_FAILED));
}
