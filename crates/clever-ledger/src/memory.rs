//! In-memory ledger running the todo program
//!
//! Executes every instruction with the same account checks the deployed
//! program performs, so a session exercised against it sees the same
//! confirmations and rejections. Faults can be injected per call.

use crate::client::LedgerClient;
use crate::error::{LedgerError, ProgramError};
use crate::record::{Keyed, TodoFilter, TodoRecord, UserProfile};
use crate::transaction::{Confirmation, Instruction, SignedTransaction};
use clever_address::{Address, AddressDeriver, AddressError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Injected failure behaviour
#[derive(Debug, Default)]
struct Faults {
    next_fetch: VecDeque<LedgerError>,
    next_submit: VecDeque<LedgerError>,
    latency: Duration,
    offline: bool,
}

/// Ledger call statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Transactions received
    pub submitted: u64,
    /// Transactions applied
    pub confirmed: u64,
    /// Transactions declined by the program
    pub rejected: u64,
    /// Fetch calls served (profile or items)
    pub fetches: u64,
}

/// In-memory ledger
#[derive(Debug)]
pub struct MemoryLedger {
    deriver: AddressDeriver,
    profiles: DashMap<Address, UserProfile>,
    todos: DashMap<Address, TodoRecord>,
    /// Serializes instruction execution; reads stay lock-free
    exec: Mutex<u64>,
    faults: Mutex<Faults>,
    stats: Mutex<LedgerStats>,
}

impl MemoryLedger {
    /// Empty ledger for `program_id`
    #[must_use]
    pub fn new(program_id: Address) -> Self {
        Self {
            deriver: AddressDeriver::new(program_id),
            profiles: DashMap::new(),
            todos: DashMap::new(),
            exec: Mutex::new(0),
            faults: Mutex::new(Faults::default()),
            stats: Mutex::new(LedgerStats::default()),
        }
    }

    #[must_use]
    pub fn deriver(&self) -> AddressDeriver {
        self.deriver
    }

    /// Current slot (one per confirmed transaction)
    #[must_use]
    pub fn slot(&self) -> u64 {
        *self.exec.lock()
    }

    #[must_use]
    pub fn stats(&self) -> LedgerStats {
        *self.stats.lock()
    }

    /// Transactions received so far
    #[must_use]
    pub fn submitted_count(&self) -> u64 {
        self.stats.lock().submitted
    }

    /// Fail the next fetch call with `error`
    pub fn fail_next_fetch(&self, error: LedgerError) {
        self.faults.lock().next_fetch.push_back(error);
    }

    /// Fail the next submission with `error` (nothing is applied)
    pub fn fail_next_submit(&self, error: LedgerError) {
        self.faults.lock().next_submit.push_back(error);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.faults.lock().latency = latency;
    }

    /// Refuse every call with a transport failure while `offline`
    pub fn set_offline(&self, offline: bool) {
        self.faults.lock().offline = offline;
    }

    /// Profile currently stored for `owner`
    #[must_use]
    pub fn profile_of(&self, owner: &Address) -> Option<UserProfile> {
        let address = self.deriver.profile_address(owner).ok()?;
        self.profiles.get(&address).map(|p| *p)
    }

    /// Item stored at `address`
    #[must_use]
    pub fn todo_at(&self, address: &Address) -> Option<TodoRecord> {
        self.todos.get(address).map(|t| t.clone())
    }

    /// Insert an item directly, bypassing the program
    ///
    /// For seeding foreign or malformed records in tests.
    pub fn insert_raw_todo(&self, address: Address, record: TodoRecord) {
        self.todos.insert(address, record);
    }

    async fn before_call(&self, submit: bool) -> Result<(), LedgerError> {
        let latency = self.faults.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.faults.lock();
        if faults.offline {
            return Err(LedgerError::Transport("ledger unreachable".to_string()));
        }
        let queued = if submit {
            faults.next_submit.pop_front()
        } else {
            faults.next_fetch.pop_front()
        };
        queued.map_or(Ok(()), Err)
    }

    fn execute(&self, signed: &SignedTransaction) -> Result<(), ProgramError> {
        if !signed.verify() {
            return Err(ProgramError::InvalidSignature);
        }

        let tx = &signed.transaction;
        let authority = tx.authority;
        let profile_address = self
            .deriver
            .profile_address(&authority)
            .map_err(|_| ProgramError::ConstraintSeeds)?;
        if tx.accounts.profile != profile_address
            || tx.instruction.touches_item() != tx.accounts.todo.is_some()
        {
            return Err(ProgramError::ConstraintSeeds);
        }

        match &tx.instruction {
            Instruction::InitializeUser => {
                if self.profiles.contains_key(&profile_address) {
                    return Err(ProgramError::AccountAlreadyInUse);
                }
                self.profiles
                    .insert(profile_address, UserProfile::new(authority));
                tracing::info!(authority = %authority.short(), "user profile initialized");
            }
            Instruction::AddTodo { content } => {
                let mut profile = self
                    .profiles
                    .get_mut(&profile_address)
                    .ok_or(ProgramError::AccountNotInitialized)?;
                if profile.authority != authority {
                    return Err(ProgramError::Unauthorized);
                }

                let todo_address = self
                    .deriver
                    .todo_address(&authority, u64::from(profile.next_sequence))
                    .map_err(|e| match e {
                        AddressError::AddressSpaceExhausted { .. } => ProgramError::MathOverflow,
                        _ => ProgramError::ConstraintSeeds,
                    })?;
                if tx.accounts.todo != Some(todo_address) {
                    return Err(ProgramError::ConstraintSeeds);
                }
                if self.todos.contains_key(&todo_address) {
                    return Err(ProgramError::AccountAlreadyInUse);
                }

                let sequence =
                    u8::try_from(profile.next_sequence).map_err(|_| ProgramError::MathOverflow)?;
                let next_sequence = profile
                    .next_sequence
                    .checked_add(1)
                    .ok_or(ProgramError::MathOverflow)?;
                let todo_count = profile
                    .todo_count
                    .checked_add(1)
                    .ok_or(ProgramError::MathOverflow)?;

                self.todos.insert(
                    todo_address,
                    TodoRecord {
                        authority,
                        sequence,
                        content: content.clone(),
                        marked: false,
                    },
                );
                profile.next_sequence = next_sequence;
                profile.todo_count = todo_count;
                tracing::info!(
                    sequence,
                    next_sequence,
                    todo_count,
                    "todo added"
                );
            }
            Instruction::MarkTodo { sequence } => {
                let todo_address = self.item_account(tx.accounts.todo, &authority, *sequence)?;
                let mut todo = self
                    .todos
                    .get_mut(&todo_address)
                    .ok_or(ProgramError::AccountNotInitialized)?;
                if todo.authority != authority {
                    return Err(ProgramError::Unauthorized);
                }
                if todo.marked {
                    return Err(ProgramError::AlreadyMarked);
                }
                todo.marked = true;
                tracing::info!(sequence, "todo marked");
            }
            Instruction::RemoveTodo { sequence } => {
                let todo_address = self.item_account(tx.accounts.todo, &authority, *sequence)?;
                let mut profile = self
                    .profiles
                    .get_mut(&profile_address)
                    .ok_or(ProgramError::AccountNotInitialized)?;
                match self.todos.get(&todo_address) {
                    Some(todo) if todo.authority != authority => {
                        return Err(ProgramError::Unauthorized)
                    }
                    Some(_) => {}
                    None => return Err(ProgramError::AccountNotInitialized),
                }
                let todo_count = profile
                    .todo_count
                    .checked_sub(1)
                    .ok_or(ProgramError::MathOverflow)?;
                self.todos.remove(&todo_address);
                profile.todo_count = todo_count;
                tracing::info!(sequence, todo_count, "todo removed");
            }
        }

        Ok(())
    }

    fn item_account(
        &self,
        passed: Option<Address>,
        authority: &Address,
        sequence: u8,
    ) -> Result<Address, ProgramError> {
        let expected = self
            .deriver
            .todo_address(authority, u64::from(sequence))
            .map_err(|_| ProgramError::ConstraintSeeds)?;
        if passed == Some(expected) {
            Ok(expected)
        } else {
            Err(ProgramError::ConstraintSeeds)
        }
    }
}

#[async_trait::async_trait]
impl LedgerClient for MemoryLedger {
    async fn fetch_profile(
        &self,
        address: &Address,
    ) -> Result<Option<Keyed<UserProfile>>, LedgerError> {
        self.before_call(false).await?;
        self.stats.lock().fetches += 1;
        Ok(self
            .profiles
            .get(address)
            .map(|p| Keyed::new(*address, *p)))
    }

    async fn fetch_todos(
        &self,
        filter: &TodoFilter,
    ) -> Result<Vec<Keyed<TodoRecord>>, LedgerError> {
        self.before_call(false).await?;
        self.stats.lock().fetches += 1;
        let mut found: Vec<Keyed<TodoRecord>> = self
            .todos
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| Keyed::new(*entry.key(), entry.value().clone()))
            .collect();
        found.sort_by_key(|k| (k.record.authority, k.record.sequence));
        Ok(found)
    }

    async fn send_transaction(
        &self,
        transaction: SignedTransaction,
    ) -> Result<Confirmation, LedgerError> {
        self.before_call(true).await?;

        let mut slot = self.exec.lock();
        self.stats.lock().submitted += 1;
        let instruction = transaction.transaction.instruction.name();

        match self.execute(&transaction) {
            Ok(()) => {
                *slot += 1;
                self.stats.lock().confirmed += 1;
                Ok(Confirmation {
                    signature: transaction.id(),
                    slot: *slot,
                })
            }
            Err(reason) => {
                self.stats.lock().rejected += 1;
                tracing::warn!(instruction, code = reason.code(), %reason, "transaction rejected");
                Err(LedgerError::Rejected(reason))
            }
        }
    }
}
