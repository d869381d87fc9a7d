use chrono::{Duration, Utc};
use uuid::Uuid;

use mealdrop_domain::pagination::PageRequest;
use mealdrop_server::error::ServerError;
use mealdrop_server::usecase::notification::{
    ListNotificationsUseCase, MarkAllNotificationsReadUseCase, MarkNotificationReadUseCase,
};

use crate::helpers::{MockStore, test_notification};

// ── ListNotificationsUseCase ─────────────────────────────────────────────────

#[tokio::test]
async fn should_list_newest_first_in_pages() {
    let store = MockStore::new();
    let reader = Uuid::new_v4();
    let base = Utc::now();
    for (subject, age_mins) in [("oldest", 2), ("middle", 1), ("newest", 0)] {
        let mut row = test_notification(reader, subject);
        row.created_at = base - Duration::minutes(age_mins);
        store.seed_notification(row);
    }

    let list = ListNotificationsUseCase {
        notifications: store.clone(),
    };

    let feed = list.execute(reader, PageRequest::default()).await.unwrap();
    let subjects: Vec<&str> = feed.iter().map(|n| n.subject.as_str()).collect();
    assert_eq!(subjects, ["newest", "middle", "oldest"]);

    let tail = list
        .execute(reader, PageRequest { per_page: 2, page: 2 })
        .await
        .unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].subject, "oldest");
}

// ── MarkNotificationReadUseCase ──────────────────────────────────────────────

#[tokio::test]
async fn should_stamp_read_once_and_keep_the_stamp() {
    let store = MockStore::new();
    let reader = Uuid::new_v4();
    let row = store.seed_notification(test_notification(reader, "Pickup confirmed"));

    let mark = MarkNotificationReadUseCase {
        notifications: store.clone(),
    };

    let stamped = mark.execute(reader, row.id).await.unwrap();
    let first_stamp = stamped.read_at.expect("marking must set the stamp");

    let again = mark.execute(reader, row.id).await.unwrap();
    assert_eq!(
        again.read_at,
        Some(first_stamp),
        "re-reading must keep the original stamp"
    );
}

#[tokio::test]
async fn should_mask_other_accounts_inboxes() {
    let store = MockStore::new();
    let owner = Uuid::new_v4();
    let row = store.seed_notification(test_notification(owner, "New claim on your meal"));

    let mark = MarkNotificationReadUseCase {
        notifications: store.clone(),
    };

    let peeping = mark.execute(Uuid::new_v4(), row.id).await;
    assert!(
        matches!(peeping, Err(ServerError::NotificationNotFound)),
        "someone else's notification must read as absent, got {peeping:?}"
    );

    let phantom = mark.execute(owner, Uuid::new_v4()).await;
    assert!(
        matches!(phantom, Err(ServerError::NotificationNotFound)),
        "expected NotificationNotFound, got {phantom:?}"
    );

    assert!(
        store.notifications.lock().unwrap()[0].read_at.is_none(),
        "a masked attempt must not stamp the row"
    );
}

// ── MarkAllNotificationsReadUseCase ──────────────────────────────────────────

#[tokio::test]
async fn should_sweep_the_unread_pile_once() {
    let store = MockStore::new();
    let reader = Uuid::new_v4();
    let neighbour = Uuid::new_v4();
    store.seed_notification(test_notification(reader, "New claim on your meal"));
    store.seed_notification(test_notification(reader, "Pickup confirmed"));
    let mut seen = test_notification(reader, "Welcome to Mealdrop");
    seen.read_at = Some(Utc::now());
    store.seed_notification(seen);
    store.seed_notification(test_notification(neighbour, "New claim on your meal"));

    let sweep = MarkAllNotificationsReadUseCase {
        notifications: store.clone(),
    };

    assert_eq!(sweep.execute(reader).await.unwrap(), 2);
    assert_eq!(sweep.execute(reader).await.unwrap(), 0, "the pile is already read");

    let rows = store.notifications.lock().unwrap();
    assert!(
        rows.iter()
            .filter(|n| n.account_id == reader)
            .all(|n| n.read_at.is_some())
    );
    let neighbours: Vec<_> = rows
        .iter()
        .filter(|n| n.account_id == neighbour)
        .collect();
    assert!(
        neighbours.iter().all(|n| n.read_at.is_none()),
        "the sweep must stay inside one inbox"
    );
}
