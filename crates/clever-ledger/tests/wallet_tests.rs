use clever_address::Address;
use clever_ledger::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<MemoryLedger>, KeypairWallet) {
    let ledger = Arc::new(MemoryLedger::new(Address::hash_of(b"clever_todo")));
    let wallet = KeypairWallet::from_seed([9u8; 32], ledger.clone());
    (ledger, wallet)
}

fn init_tx(ledger: &MemoryLedger, wallet: &KeypairWallet) -> Transaction {
    let profile = ledger.deriver().profile_address(&wallet.identity()).unwrap();
    Transaction::new(
        Instruction::InitializeUser,
        AccountSet {
            profile,
            todo: None,
        },
        wallet.identity(),
    )
}

#[tokio::test]
async fn test_wallet_signs_and_confirms() {
    let (ledger, wallet) = setup();
    let confirmation = wallet
        .sign_and_submit(init_tx(&ledger, &wallet))
        .await
        .unwrap();

    assert_eq!(confirmation.slot, 1);
    assert!(ledger.profile_of(&wallet.identity()).is_some());
}

#[tokio::test]
async fn test_wallet_identity_is_stable_per_seed() {
    let ledger = Arc::new(MemoryLedger::new(Address::hash_of(b"clever_todo")));
    let a = KeypairWallet::from_seed([1u8; 32], ledger.clone());
    let b = KeypairWallet::from_seed([1u8; 32], ledger.clone());
    let c = KeypairWallet::generate(ledger);
    assert_eq!(a.identity(), b.identity());
    assert_ne!(a.identity(), c.identity());
}

#[tokio::test]
async fn test_disconnected_wallet_does_not_submit() {
    let (ledger, wallet) = setup();
    wallet.disconnect();
    assert!(!wallet.is_connected());

    let result = wallet.sign_and_submit(init_tx(&ledger, &wallet)).await;
    assert!(matches!(result, Err(LedgerError::Disconnected(_))));
    assert_eq!(ledger.submitted_count(), 0);

    wallet.connect();
    assert!(wallet.sign_and_submit(init_tx(&ledger, &wallet)).await.is_ok());
}

#[tokio::test]
async fn test_wallet_refuses_foreign_authority() {
    let (ledger, wallet) = setup();
    let mut tx = init_tx(&ledger, &wallet);
    tx.authority = Address::hash_of(b"someone-else");

    let result = wallet.sign_and_submit(tx).await;
    assert!(matches!(result, Err(LedgerError::SignatureRejected(_))));
    assert_eq!(ledger.submitted_count(), 0);
}

#[tokio::test]
async fn test_repeated_identical_instructions_get_distinct_ids() {
    let (ledger, wallet) = setup();
    wallet
        .sign_and_submit(init_tx(&ledger, &wallet))
        .await
        .unwrap();
    let todo = ledger.deriver().todo_address(&wallet.identity(), 0).unwrap();
    let profile = ledger.deriver().profile_address(&wallet.identity()).unwrap();

    let add = |content: &str, todo| {
        Transaction::new(
            Instruction::AddTodo {
                content: content.to_string(),
            },
            AccountSet {
                profile,
                todo: Some(todo),
            },
            wallet.identity(),
        )
    };
    let first = wallet.sign_and_submit(add("same", todo)).await.unwrap();
    let next = ledger.deriver().todo_address(&wallet.identity(), 1).unwrap();
    let second = wallet.sign_and_submit(add("same", next)).await.unwrap();
    assert_ne!(first.signature, second.signature);
    assert_eq!(second.slot, 3);
}

#[tokio::test(start_paused = true)]
async fn test_latency_delays_confirmation() {
    let (ledger, wallet) = setup();
    ledger.set_latency(Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    wallet
        .sign_and_submit(init_tx(&ledger, &wallet))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(5));
}
