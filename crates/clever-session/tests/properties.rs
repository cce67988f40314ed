use clever_address::Address;
use clever_ledger::{LedgerClient, LedgerError, ProgramError, TodoRecord, Wallet};
use clever_session::{
    ErrorClass, FetchError, GuardState, NoticeLevel, Outcome, Precondition, SessionConfig,
    SessionError, StateFetcher, TodoSession, TxError, TxErrorKind,
};
use clever_test_utils::{memory_ledger, seeded_wallet, CollectingSink, Fixture, LeakyLedger};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

/// Alice and Bob each own two items on the same ledger
async fn shared_ledger() -> (Arc<clever_ledger::MemoryLedger>, Address, Address) {
    let ledger = memory_ledger();
    let mut owners = Vec::new();
    for seed in [21u8, 22] {
        let wallet = seeded_wallet(seed, ledger.clone());
        let session = TodoSession::new(SessionConfig::default(), ledger.clone()).unwrap();
        session.set_wallet(Some(wallet.clone())).await;
        session.initialize_user().await.unwrap();
        session.add_todo("first").await.unwrap();
        session.add_todo("second").await.unwrap();
        owners.push(wallet.identity());
    }
    (ledger, owners[0], owners[1])
}

#[tokio::test]
async fn test_fetch_discards_foreign_items_from_unfiltered_ledger() {
    let (ledger, alice, bob) = shared_ledger().await;
    let leaky = LeakyLedger::new(ledger.clone());
    let fetcher = StateFetcher::new(leaky.clone(), ledger.deriver(), Duration::from_secs(1));

    // The leaky ledger really does hand back everyone's items
    let everything = leaky
        .fetch_todos(&clever_ledger::TodoFilter::by_authority(alice))
        .await
        .unwrap();
    assert_eq!(everything.len(), 4);

    let result = fetcher.fetch_state(&alice).await.unwrap();
    assert_eq!(result.items.len(), 2);
    assert!(result.items.iter().all(|item| item.owner == alice));

    let result = fetcher.fetch_state(&bob).await.unwrap();
    assert!(result.items.iter().all(|item| item.owner == bob));
}

#[tokio::test]
async fn test_fetch_discards_items_at_non_derived_addresses() {
    let (ledger, alice, _) = shared_ledger().await;
    ledger.insert_raw_todo(
        Address::hash_of(b"squatter"),
        TodoRecord {
            authority: alice,
            sequence: 0,
            content: "planted".to_string(),
            marked: false,
        },
    );
    let fetcher = StateFetcher::new(ledger.clone(), ledger.deriver(), Duration::from_secs(1));
    let result = fetcher.fetch_state(&alice).await.unwrap();
    assert_eq!(result.items.len(), 2);
    assert!(result.items.iter().all(|item| item.content != "planted"));
}

#[tokio::test]
async fn test_fetch_rejects_foreign_profile() {
    let (ledger, alice, bob) = shared_ledger().await;
    let leaky = LeakyLedger::new(ledger.clone());
    leaky.claim_profiles_for(bob);
    let fetcher = StateFetcher::new(leaky, ledger.deriver(), Duration::from_secs(1));

    let err = fetcher.fetch_state(&alice).await.unwrap_err();
    assert_eq!(err, FetchError::ForeignProfile);
}

#[tokio::test]
async fn test_fetch_missing_profile_is_not_an_error() {
    let ledger = memory_ledger();
    let fetcher = StateFetcher::new(ledger.clone(), ledger.deriver(), Duration::from_secs(1));
    let result = fetcher
        .fetch_state(&Address::hash_of(b"nobody"))
        .await
        .unwrap();
    assert!(!result.initialized());
    assert!(result.items.is_empty());
    // Items are not queried without a profile
    assert_eq!(ledger.stats().fetches, 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_times_out() {
    let ledger = memory_ledger();
    ledger.set_latency(Duration::from_secs(30));
    let fetcher = StateFetcher::new(ledger.clone(), ledger.deriver(), Duration::from_secs(2));
    let err = fetcher
        .fetch_state(&Address::hash_of(b"slow"))
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Timeout { timeout_ms: 2000 });
}

#[tokio::test]
async fn test_session_over_leaky_ledger_shows_only_own_items() {
    let (ledger, alice, _) = shared_ledger().await;
    let leaky = LeakyLedger::new(ledger.clone());
    let session = TodoSession::new(SessionConfig::default(), leaky).unwrap();
    session.set_wallet(Some(seeded_wallet(21, ledger.clone()))).await;

    let view = session.snapshot();
    assert_eq!(view.owner, Some(alice));
    assert_eq!(view.items.len(), 2);
    assert!(view.items.iter().all(|item| item.owner == alice));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_intents_never_interleave() {
    let fx = Fixture::initialized(30).await;
    fx.ledger.set_latency(Duration::from_secs(1));
    let submitted = fx.ledger.submitted_count();

    let (first, second, observed) = tokio::join!(
        fx.session.add_todo("first"),
        fx.session.add_todo("second"),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            (fx.session.guard_state(), fx.session.snapshot().pending_operation)
        }
    );

    assert!(first.unwrap().is_confirmed());
    assert_eq!(
        second.unwrap(),
        Outcome::Skipped(Precondition::OperationPending)
    );
    assert_eq!(observed, (GuardState::Busy, true));
    assert_eq!(fx.ledger.submitted_count(), submitted + 1);
    assert_eq!(fx.session.guard_stats().rejected, 1);

    let view = fx.session.snapshot();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].content, "first");
    assert!(!view.pending_operation);
}

#[tokio::test]
async fn test_guard_returns_to_idle_after_failures() {
    let fx = Fixture::initialized(31).await;

    fx.ledger
        .fail_next_submit(LedgerError::Transport("connection reset".into()));
    let err = fx.session.add_todo("lost").await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::TransportFailure);
    assert_eq!(fx.session.guard_state(), GuardState::Idle);
    assert!(!fx.session.snapshot().pending_operation);

    assert!(fx.session.add_todo("kept").await.unwrap().is_confirmed());
    assert_eq!(fx.session.guard_state(), GuardState::Idle);
    assert_eq!(fx.sink.count(NoticeLevel::Error), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_confirmation_times_out_and_releases() {
    let config = SessionConfig::default().with_confirm_timeout(Duration::from_secs(1));
    let fx = Fixture::with_config(32, config);
    fx.connect().await;
    fx.ledger.set_latency(Duration::from_secs(3600));

    let err = fx.session.initialize_user().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Tx(TxError {
            kind: TxErrorKind::Timeout,
            ..
        })
    ));
    assert!(err.is_retryable());
    assert_eq!(fx.session.guard_state(), GuardState::Idle);
    assert!(fx.ledger.profile_of(&fx.owner()).is_none());
}

#[tokio::test]
async fn test_rejected_submit_leaves_items_untouched() {
    let fx = Fixture::initialized(33).await;
    fx.session.add_todo("contested").await.unwrap();
    let target = fx.todo_address(0);

    // A second device marks the item; this session has not refreshed
    let other_device = TodoSession::new(SessionConfig::default(), fx.ledger.clone()).unwrap();
    other_device.set_wallet(Some(fx.wallet.clone())).await;
    other_device.mark_todo(&target).await.unwrap();

    let before = fx.session.snapshot();
    assert!(!before.item(&target).unwrap().marked);

    let err = fx.session.mark_todo(&target).await.unwrap_err();
    let SessionError::Tx(tx) = &err else {
        panic!("expected tx error, got {err:?}");
    };
    assert_eq!(tx.program_error, Some(ProgramError::AlreadyMarked));
    assert_eq!(err.class(), ErrorClass::RemoteRejection);
    assert_eq!(fx.session.snapshot().items, before.items);

    fx.session.fetch_todos().await.unwrap();
    assert!(fx.session.snapshot().item(&target).unwrap().marked);
}

#[tokio::test]
async fn test_transport_failure_leaves_items_untouched() {
    let fx = Fixture::initialized(34).await;
    fx.session.add_todo("a").await.unwrap();
    fx.session.add_todo("b").await.unwrap();
    let before = fx.session.snapshot();

    fx.ledger.set_offline(true);
    assert!(fx.session.remove_todo(&fx.todo_address(1)).await.is_err());
    assert!(fx.session.add_todo("c").await.is_err());
    assert_eq!(fx.session.snapshot().items, before.items);
    assert_eq!(fx.session.snapshot().next_sequence, before.next_sequence);
}

#[tokio::test]
async fn test_explicit_fetch_failure_marks_view_stale() {
    let fx = Fixture::initialized(35).await;
    fx.session.add_todo("cached").await.unwrap();

    fx.ledger
        .fail_next_fetch(LedgerError::Transport("rpc down".into()));
    let err = fx.session.fetch_todos().await.unwrap_err();
    assert!(matches!(err, SessionError::Fetch(FetchError::Ledger(_))));

    let view = fx.session.snapshot();
    assert!(view.stale);
    assert!(view.initialized);
    assert_eq!(view.items.len(), 1);

    fx.session.fetch_todos().await.unwrap();
    assert!(!fx.session.snapshot().stale);
}

#[tokio::test]
async fn test_confirmed_mutation_with_failed_refresh_warns() {
    let fx = Fixture::initialized(36).await;
    fx.ledger
        .fail_next_fetch(LedgerError::Transport("rpc down".into()));

    let outcome = fx.session.add_todo("applied").await.unwrap();
    assert!(outcome.is_confirmed());
    assert!(fx.session.snapshot().stale);
    assert_eq!(fx.sink.count(NoticeLevel::Warning), 1);
    assert!(fx.ledger.todo_at(&fx.todo_address(0)).is_some());
}

#[tokio::test]
async fn test_session_fetch_failure_defaults_to_uninitialized() {
    let fx = Fixture::new(37);
    {
        let setup = TodoSession::new(SessionConfig::default(), fx.ledger.clone()).unwrap();
        setup.set_wallet(Some(fx.wallet.clone())).await;
        setup.initialize_user().await.unwrap();
    }

    fx.ledger.set_offline(true);
    fx.connect().await;
    let view = fx.session.snapshot();
    assert!(!view.initialized);
    assert!(view.items.is_empty());
    assert!(view.stale);
    assert!(fx.sink.notices().is_empty());

    fx.ledger.set_offline(false);
    fx.session.fetch_todos().await.unwrap();
    assert!(fx.session.snapshot().initialized);
}

#[tokio::test(start_paused = true)]
async fn test_identity_switch_mid_mutation_loads_new_identity() {
    let fx = Fixture::initialized(38).await;
    let bob = seeded_wallet(39, fx.ledger.clone());
    {
        let bobs_device = TodoSession::new(SessionConfig::default(), fx.ledger.clone()).unwrap();
        bobs_device.set_wallet(Some(bob.clone())).await;
        bobs_device.initialize_user().await.unwrap();
        bobs_device.add_todo("bob's").await.unwrap();
    }
    fx.ledger.set_latency(Duration::from_secs(1));

    let (added, ()) = tokio::join!(fx.session.add_todo("alice's"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        fx.session.set_wallet(Some(bob.clone())).await;
    });
    assert!(added.unwrap().is_confirmed());
    assert!(fx.ledger.todo_at(&fx.todo_address(0)).is_some());

    let view = fx.session.snapshot();
    assert_eq!(view.owner, Some(bob.identity()));
    assert!(view.initialized);
    assert!(!view.stale);
    assert!(!view.loading);
    let contents: Vec<&str> = view.items.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["bob's"]);
    assert!(view.items.iter().all(|item| item.owner == bob.identity()));

    let submitted = fx.ledger.submitted_count();
    let again = fx.session.initialize_user().await.unwrap();
    assert_eq!(again.skipped(), Some(Precondition::AlreadyInitialized));
    assert_eq!(fx.ledger.submitted_count(), submitted);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_proceeds_while_mutation_pending() {
    let fx = Fixture::initialized(42).await;
    fx.session.add_todo("cached").await.unwrap();
    fx.ledger.set_latency(Duration::from_secs(1));

    let (added, (before, fetched, after)) = tokio::join!(fx.session.add_todo("slow"), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let before = fx.session.guard_state();
        let fetched = fx.session.fetch_todos().await;
        (before, fetched, fx.session.guard_state())
    });

    assert_eq!(before, GuardState::Busy);
    fetched.unwrap();
    assert_eq!(after, GuardState::Busy);
    assert!(added.unwrap().is_confirmed());
    assert_eq!(fx.session.guard_stats().rejected, 0);
    assert_eq!(fx.session.snapshot().items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_add_flags_view_stale() {
    let config = SessionConfig::default().with_confirm_timeout(Duration::from_secs(1));
    let fx = Fixture::with_config(43, config);
    fx.connect().await;
    fx.session.initialize_user().await.unwrap();
    fx.session.add_todo("kept").await.unwrap();
    fx.sink.clear();
    let before = fx.session.snapshot();

    fx.ledger.set_latency(Duration::from_secs(5));
    let err = fx.session.add_todo("in limbo").await.unwrap_err();
    assert!(err.is_unconfirmed());

    let view = fx.session.snapshot();
    assert!(view.stale);
    assert_eq!(view.items, before.items);
    assert_eq!(view.next_sequence, before.next_sequence);
    assert_eq!(fx.sink.notices().len(), 1);
    assert_eq!(fx.sink.count(NoticeLevel::Error), 1);

    fx.ledger.set_latency(Duration::ZERO);
    fx.session.fetch_todos().await.unwrap();
    assert!(!fx.session.snapshot().stale);
}

#[tokio::test(start_paused = true)]
async fn test_loading_flag_spans_fetch() {
    let fx = Fixture::initialized(40).await;
    fx.ledger.set_latency(Duration::from_secs(1));

    let (fetched, during) = tokio::join!(fx.session.fetch_todos(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fx.session.snapshot().loading
    });
    fetched.unwrap();
    assert!(during);
    assert!(!fx.session.snapshot().loading);
}

#[tokio::test]
async fn test_collecting_sink_records_outcomes() {
    let sink = CollectingSink::new();
    let ledger = memory_ledger();
    let session = TodoSession::new(SessionConfig::default(), ledger.clone())
        .unwrap()
        .with_sink(sink.clone());
    session
        .set_wallet(Some(seeded_wallet(41, ledger.clone())))
        .await;
    session.initialize_user().await.unwrap();
    session.initialize_user().await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["Successfully initialized user.", "User already initialized!"]
    );
}
