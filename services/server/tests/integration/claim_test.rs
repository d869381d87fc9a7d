use chrono::Utc;
use tokio::task::JoinSet;
use uuid::Uuid;

use mealdrop_domain::account::AccountRole;
use mealdrop_domain::pagination::PageRequest;
use mealdrop_server::domain::repository::ClaimRepository;
use mealdrop_server::domain::types::{Account, ClaimStatus, Meal, NotificationChannel};
use mealdrop_server::error::ServerError;
use mealdrop_server::usecase::claim::{
    CancelClaimUseCase, ConfirmClaimUseCase, CreateClaimUseCase, ListClaimsUseCase,
    VerifyCollectionUseCase,
};
use mealdrop_server::usecase::meal::SweepExpiredMealsUseCase;

use crate::helpers::{MockDispatch, MockStore, test_account, test_claim, test_meal};

type Creator = CreateClaimUseCase<MockStore, MockStore, MockStore, MockStore, MockStore, MockDispatch>;

fn creator(store: &MockStore) -> Creator {
    CreateClaimUseCase {
        accounts: store.clone(),
        claims: store.clone(),
        meals: store.clone(),
        issuer: store.issuer(MockDispatch::reliable()),
        notifications: store.clone(),
    }
}

fn collector(store: &MockStore) -> VerifyCollectionUseCase<MockStore, MockStore, MockStore, MockStore> {
    VerifyCollectionUseCase {
        claims: store.clone(),
        meals: store.clone(),
        verifier: store.verifier(),
        notifications: store.clone(),
    }
}

/// Provider, beneficiary, and a claimable ten portion meal.
fn cast(store: &MockStore) -> (Account, Account, Meal) {
    let provider = store.seed_account(test_account("host", AccountRole::Provider));
    let diner = store.seed_account(test_account("guest", AccountRole::Beneficiary));
    let meal = store.seed_meal(test_meal(provider.id, 51.5030, -0.0900));
    (provider, diner, meal)
}

// ── CreateClaimUseCase ───────────────────────────────────────────────────────

#[tokio::test]
async fn should_reserve_portions_and_hand_out_both_secrets() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);

    let created = creator(&store).execute(diner.id, meal.id, 2).await.unwrap();

    assert_eq!(created.claim.status, ClaimStatus::Pending);
    assert_eq!(created.otp.len(), 6);
    assert!(created.otp.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(created.claim.confirmation_code.len(), 8);
    assert_eq!(store.meals.lock().unwrap()[0].remaining_quantity, 8);

    let rows = store.notifications.lock().unwrap();
    let heads_up = rows
        .iter()
        .find(|n| n.account_id == provider.id)
        .expect("the provider hears about the claim");
    assert_eq!(heads_up.channel, NotificationChannel::InApp);
    assert_eq!(heads_up.meal_id, Some(meal.id));
    assert_eq!(heads_up.claim_id, Some(created.claim.id));

    let code_sms = rows
        .iter()
        .find(|n| n.account_id == diner.id)
        .expect("the collection code goes out to the beneficiary");
    assert_eq!(code_sms.channel, NotificationChannel::Sms);
}

#[tokio::test]
async fn should_allow_one_open_claim_per_pair() {
    let store = MockStore::new();
    let (_, diner, meal) = cast(&store);

    let first = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();
    let repeat = creator(&store).execute(diner.id, meal.id, 1).await;
    assert!(
        matches!(repeat, Err(ServerError::AlreadyClaimed)),
        "expected AlreadyClaimed, got {repeat:?}"
    );

    // A cancelled claim no longer holds the slot.
    let cancel = CancelClaimUseCase {
        claims: store.clone(),
        meals: store.clone(),
    };
    cancel.execute(diner.id, first.claim.id).await.unwrap();
    let again = creator(&store).execute(diner.id, meal.id, 1).await;
    assert!(again.is_ok(), "a cancelled claim must not block a new one, got {again:?}");
}

#[tokio::test]
async fn should_refuse_doomed_claims_up_front() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);

    let zero = creator(&store).execute(diner.id, meal.id, 0).await;
    assert!(
        matches!(zero, Err(ServerError::InvalidQuantity)),
        "expected InvalidQuantity, got {zero:?}"
    );

    let greedy = creator(&store).execute(diner.id, meal.id, 11).await;
    assert!(
        matches!(greedy, Err(ServerError::InsufficientQuantity)),
        "expected InsufficientQuantity, got {greedy:?}"
    );

    let mut dark = test_meal(provider.id, 51.5030, -0.0900);
    dark.active = false;
    let dark = store.seed_meal(dark);
    let off = creator(&store).execute(diner.id, dark.id, 1).await;
    assert!(
        matches!(off, Err(ServerError::MealInactive)),
        "expected MealInactive, got {off:?}"
    );

    let phantom = creator(&store).execute(diner.id, Uuid::new_v4(), 1).await;
    assert!(
        matches!(phantom, Err(ServerError::MealNotFound)),
        "expected MealNotFound, got {phantom:?}"
    );

    let stranger = creator(&store).execute(Uuid::new_v4(), meal.id, 1).await;
    assert!(
        matches!(stranger, Err(ServerError::AccountNotFound)),
        "expected AccountNotFound, got {stranger:?}"
    );

    assert!(store.claims.lock().unwrap().is_empty());
    assert_eq!(
        store.meals.lock().unwrap()[0].remaining_quantity,
        10,
        "refused claims must not move the ledger"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_never_hand_out_more_portions_than_remain() {
    let store = MockStore::new();
    let provider = store.seed_account(test_account("fairshare", AccountRole::Provider));
    let mut meal = test_meal(provider.id, 51.5030, -0.0900);
    meal.total_quantity = 3;
    meal.remaining_quantity = 3;
    let meal = store.seed_meal(meal);

    let mut race = JoinSet::new();
    for i in 0..8 {
        let diner = store.seed_account(test_account(&format!("rush-{i}"), AccountRole::Beneficiary));
        let store = store.clone();
        let meal_id = meal.id;
        race.spawn(async move { creator(&store).execute(diner.id, meal_id, 1).await });
    }

    let mut won = 0;
    let mut lost = 0;
    while let Some(joined) = race.join_next().await {
        match joined.unwrap() {
            Ok(_) => won += 1,
            Err(ServerError::InsufficientQuantity | ServerError::MealInactive) => lost += 1,
            Err(other) => panic!("unexpected claim failure: {other:?}"),
        }
    }

    assert_eq!(won, 3, "exactly the remaining portions can be won");
    assert_eq!(lost, 5);
    assert_eq!(store.meals.lock().unwrap()[0].remaining_quantity, 0);
    assert_eq!(store.claims.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn should_report_depletion_as_insufficient_quantity() {
    let store = MockStore::new();
    let provider = store.seed_account(test_account("lastcall", AccountRole::Provider));
    let mut meal = test_meal(provider.id, 51.5030, -0.0900);
    meal.total_quantity = 1;
    meal.remaining_quantity = 1;
    let meal = store.seed_meal(meal);

    let first = store.seed_account(test_account("early", AccountRole::Beneficiary));
    let second = store.seed_account(test_account("late", AccountRole::Beneficiary));

    creator(&store).execute(first.id, meal.id, 1).await.unwrap();

    // The meal is still live, just out of portions, so the second diner
    // hears about the quantity rather than a vanished listing.
    let late = creator(&store).execute(second.id, meal.id, 1).await;
    assert!(
        matches!(late, Err(ServerError::InsufficientQuantity)),
        "expected InsufficientQuantity, got {late:?}"
    );
}

// ── ConfirmClaimUseCase ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_confirm_with_the_collection_code_once() {
    let store = MockStore::new();
    let (_, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let confirm = ConfirmClaimUseCase {
        claims: store.clone(),
        verifier: store.verifier(),
    };
    let confirmed = confirm
        .execute(diner.id, created.claim.id, &created.otp)
        .await
        .unwrap();
    assert_eq!(confirmed.status, ClaimStatus::Confirmed);
    assert_eq!(store.claims.lock().unwrap()[0].status, ClaimStatus::Confirmed);

    // Confirming again answers quietly, without asking for another code.
    let repeat = confirm
        .execute(diner.id, created.claim.id, "ignored")
        .await
        .unwrap();
    assert_eq!(repeat.status, ClaimStatus::Confirmed);

    let stranger = store.seed_account(test_account("stranger", AccountRole::Beneficiary));
    let masked = confirm.execute(stranger.id, created.claim.id, &created.otp).await;
    assert!(
        matches!(masked, Err(ServerError::ClaimNotFound)),
        "someone else's claim must read as absent, got {masked:?}"
    );
}

#[tokio::test]
async fn should_reject_a_wrong_confirmation_code() {
    let store = MockStore::new();
    let (_, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let confirm = ConfirmClaimUseCase {
        claims: store.clone(),
        verifier: store.verifier(),
    };
    let wrong = confirm
        .execute(diner.id, created.claim.id, "not-the-code")
        .await;
    assert!(
        matches!(wrong, Err(ref e) if e.is_auth_failure()),
        "expected an auth failure, got {wrong:?}"
    );
    assert_eq!(
        store.claims.lock().unwrap()[0].status,
        ClaimStatus::Pending,
        "a failed confirmation must not move the claim"
    );
}

#[tokio::test]
async fn should_advance_a_pending_claim_exactly_once() {
    let store = MockStore::new();
    let (_, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    // The guarded update reports whether it moved the row, so a racing
    // second confirmation sees no pending claim left to advance.
    let now = Utc::now();
    assert!(store.mark_confirmed(created.claim.id, now).await.unwrap());
    assert!(
        !store.mark_confirmed(created.claim.id, now).await.unwrap(),
        "a claim that already left pending must report no rows"
    );
    assert_eq!(store.claims.lock().unwrap()[0].status, ClaimStatus::Confirmed);
}

// ── VerifyCollectionUseCase ──────────────────────────────────────────────────

#[tokio::test]
async fn should_hand_over_against_the_confirmation_code() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 2).await.unwrap();

    let collected = collector(&store)
        .execute(provider.id, created.claim.id, &created.claim.confirmation_code)
        .await
        .unwrap();
    assert_eq!(collected.status, ClaimStatus::Collected);
    assert!(collected.collected_at.is_some());

    let notified = store
        .notifications
        .lock()
        .unwrap()
        .iter()
        .any(|n| n.account_id == diner.id && n.subject == "Pickup confirmed");
    assert!(notified, "the beneficiary hears about the handover");

    let replay = collector(&store)
        .execute(provider.id, created.claim.id, &created.claim.confirmation_code)
        .await;
    assert!(
        matches!(replay, Err(ServerError::AlreadyCollected)),
        "expected AlreadyCollected, got {replay:?}"
    );
}

#[tokio::test]
async fn should_accept_the_beneficiary_otp_as_fallback() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let collected = collector(&store)
        .execute(provider.id, created.claim.id, &created.otp)
        .await
        .unwrap();
    assert_eq!(collected.status, ClaimStatus::Collected);
}

#[tokio::test]
async fn should_turn_down_a_code_that_matches_nothing() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 2).await.unwrap();

    let wrong = collector(&store)
        .execute(provider.id, created.claim.id, "WRONG123")
        .await;
    assert!(
        matches!(wrong, Err(ServerError::CodeMismatch)),
        "expected CodeMismatch, got {wrong:?}"
    );
    assert_eq!(store.claims.lock().unwrap()[0].status, ClaimStatus::Pending);
    assert_eq!(
        store.meals.lock().unwrap()[0].remaining_quantity,
        8,
        "a failed handover keeps the reservation in place"
    );
}

#[tokio::test]
async fn should_mask_collections_for_other_providers() {
    let store = MockStore::new();
    let (_, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let other = store.seed_account(test_account("other-kitchen", AccountRole::Provider));
    let masked = collector(&store)
        .execute(other.id, created.claim.id, &created.claim.confirmation_code)
        .await;
    assert!(
        matches!(masked, Err(ServerError::ClaimNotFound)),
        "a claim on someone else's meal must read as absent, got {masked:?}"
    );
}

#[tokio::test]
async fn should_refuse_collection_once_the_claim_is_cancelled() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let cancel = CancelClaimUseCase {
        claims: store.clone(),
        meals: store.clone(),
    };
    cancel.execute(diner.id, created.claim.id).await.unwrap();

    let late = collector(&store)
        .execute(provider.id, created.claim.id, &created.claim.confirmation_code)
        .await;
    assert!(
        matches!(late, Err(ServerError::ClaimCancelled)),
        "expected ClaimCancelled, got {late:?}"
    );
}

// ── CancelClaimUseCase ───────────────────────────────────────────────────────

#[tokio::test]
async fn should_return_portions_and_revive_a_spent_listing() {
    let store = MockStore::new();
    let provider = store.seed_account(test_account("revival", AccountRole::Provider));
    let diner = store.seed_account(test_account("walker", AccountRole::Beneficiary));
    let mut meal = test_meal(provider.id, 51.5030, -0.0900);
    meal.total_quantity = 2;
    meal.remaining_quantity = 2;
    let meal = store.seed_meal(meal);

    let created = creator(&store).execute(diner.id, meal.id, 2).await.unwrap();
    assert_eq!(store.meals.lock().unwrap()[0].remaining_quantity, 0);

    // The sweep retires the spent listing.
    let sweep = SweepExpiredMealsUseCase {
        meals: store.clone(),
    };
    assert_eq!(sweep.execute().await.unwrap(), 1);
    assert!(store.meals.lock().unwrap()[0].expired);

    // Cancelling restocks and revives it, because serving is still ahead.
    let cancel = CancelClaimUseCase {
        claims: store.clone(),
        meals: store.clone(),
    };
    let cancelled = cancel.execute(diner.id, created.claim.id).await.unwrap();
    assert_eq!(cancelled.status, ClaimStatus::Cancelled);
    {
        let meals = store.meals.lock().unwrap();
        assert_eq!(meals[0].remaining_quantity, 2);
        assert!(!meals[0].expired, "portions came back and serving is still ahead");
    }

    // A repeat cancel answers quietly without touching the ledger.
    let repeat = cancel.execute(diner.id, created.claim.id).await.unwrap();
    assert_eq!(repeat.status, ClaimStatus::Cancelled);
    assert_eq!(store.meals.lock().unwrap()[0].remaining_quantity, 2);
}

#[tokio::test]
async fn should_let_the_provider_pull_a_claim_but_nobody_else() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    let cancel = CancelClaimUseCase {
        claims: store.clone(),
        meals: store.clone(),
    };

    let stranger = store.seed_account(test_account("bystander", AccountRole::Beneficiary));
    let masked = cancel.execute(stranger.id, created.claim.id).await;
    assert!(
        matches!(masked, Err(ServerError::ClaimNotFound)),
        "expected ClaimNotFound, got {masked:?}"
    );

    let pulled = cancel.execute(provider.id, created.claim.id).await.unwrap();
    assert_eq!(pulled.status, ClaimStatus::Cancelled);
    assert_eq!(store.meals.lock().unwrap()[0].remaining_quantity, 10);
}

#[tokio::test]
async fn should_keep_collected_portions_collected() {
    let store = MockStore::new();
    let (provider, diner, meal) = cast(&store);
    let created = creator(&store).execute(diner.id, meal.id, 1).await.unwrap();

    collector(&store)
        .execute(provider.id, created.claim.id, &created.claim.confirmation_code)
        .await
        .unwrap();

    let cancel = CancelClaimUseCase {
        claims: store.clone(),
        meals: store.clone(),
    };
    let late = cancel.execute(diner.id, created.claim.id).await;
    assert!(
        matches!(late, Err(ServerError::InvalidTransition)),
        "expected InvalidTransition, got {late:?}"
    );
}

// ── ListClaimsUseCase ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_scope_claim_listings_by_role() {
    let store = MockStore::new();
    let provider_a = store.seed_account(test_account("north-kitchen", AccountRole::Provider));
    let provider_b = store.seed_account(test_account("south-kitchen", AccountRole::Provider));
    let diner_a = store.seed_account(test_account("ana", AccountRole::Beneficiary));
    let diner_b = store.seed_account(test_account("ben", AccountRole::Beneficiary));
    let meal_a = store.seed_meal(test_meal(provider_a.id, 51.5030, -0.0900));
    let meal_b = store.seed_meal(test_meal(provider_b.id, 51.5030, -0.0900));

    store.seed_claim(test_claim(meal_a.id, diner_a.id, 1));
    store.seed_claim(test_claim(meal_b.id, diner_a.id, 2));
    store.seed_claim(test_claim(meal_a.id, diner_b.id, 1));

    let list = ListClaimsUseCase {
        claims: store.clone(),
    };

    let ana_sees = list
        .execute(diner_a.id, AccountRole::Beneficiary, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ana_sees.len(), 2);
    assert!(ana_sees.iter().all(|c| c.beneficiary_id == diner_a.id));

    let north_sees = list
        .execute(provider_a.id, AccountRole::Provider, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(north_sees.len(), 2);
    assert!(north_sees.iter().all(|c| c.meal_id == meal_a.id));

    let south_sees = list
        .execute(provider_b.id, AccountRole::Provider, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(south_sees.len(), 1);
    assert_eq!(south_sees[0].meal_id, meal_b.id);
}
