use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::database::{TrackableItem, User, UserStatus};
use crate::models::nlp::{ParsedMessage, RawEntity};
use crate::services::messages;
use crate::utils::entity_extractor::{extract_entities, ExtractedEntities};

use super::store::StateStore;
use super::types::{ConversationState, ExpenseContext, StateEntry};

/// NLP classification outcome. A transport or decoding failure is a first-class
/// variant so callers cannot mistake it for a parsed-but-empty result.
#[derive(Debug, Clone)]
pub enum NlpOutcome {
    Parsed(ParsedMessage),
    Unavailable,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NlpProvider: Send + Sync {
    async fn parse(&self, text: &str) -> NlpOutcome;
}

/// Persistence operations the dispatcher needs. Implemented by the Postgres
/// repository; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_or_create_user(&self, phone_number: &str) -> Result<User>;
    async fn update_user_status(&self, user_id: i32, status: UserStatus) -> Result<()>;
    async fn log_personal_expense(&self, user_id: i32, amount: f64, item_name: &str)
        -> Result<()>;
    async fn log_shared_expense(
        &self,
        user_id: i32,
        total_amount: f64,
        item_name: &str,
        participants: &[String],
    ) -> Result<()>;
    async fn query_balance(&self, user_id: i32, person: &str) -> Result<f64>;
    async fn add_item(&self, user_id: i32, item_name: &str) -> Result<TrackableItem>;
    async fn get_items(&self, user_id: i32) -> Result<Vec<TrackableItem>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Greet,
    Goodbye,
    AddItem,
    ListItems,
    LogPersonalExpense,
    LogSharedExpense,
    QueryBalance,
    Unknown,
}

impl Intent {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "greet" => Self::Greet,
            "goodbye" => Self::Goodbye,
            "add_item" => Self::AddItem,
            "list_items" => Self::ListItems,
            "log_personal_expense" => Self::LogPersonalExpense,
            "log_shared_expense" => Self::LogSharedExpense,
            "query_balance" => Self::QueryBalance,
            _ => Self::Unknown,
        }
    }
}

/// The two-level conversational FSM: account status first, then the ephemeral
/// conversational state, then (when idle) the classified intent.
///
/// There is no per-user mutual exclusion: two in-flight messages from the same
/// user may both read the same conversation state and race to overwrite it.
pub struct Dispatcher {
    store: Box<dyn LedgerStore>,
    states: Box<dyn StateStore>,
    nlp: Box<dyn NlpProvider>,
}

impl Dispatcher {
    pub fn new(
        store: Box<dyn LedgerStore>,
        states: Box<dyn StateStore>,
        nlp: Box<dyn NlpProvider>,
    ) -> Self {
        Self { store, states, nlp }
    }

    /// Handle one inbound message. Returns the reply text, or `None` when no
    /// reply should be sent. Persistence failures propagate; state-store and
    /// NLP failures are absorbed by their fail-soft contracts.
    pub async fn handle_message(&self, from: &str, body: &str) -> Result<Option<String>> {
        let user = self.store.find_or_create_user(from).await?;
        debug!("Dispatching message for user {} ({:?})", user.user_id, user.status);

        match user.status {
            UserStatus::PendingOnboarding => {
                // Unconditional welcome, regardless of what was sent.
                self.store
                    .update_user_status(user.user_id, UserStatus::AwaitingConfirmation)
                    .await?;
                Ok(Some(messages::onboarding_welcome()))
            }
            UserStatus::AwaitingConfirmation => {
                if body.trim().eq_ignore_ascii_case("yes") {
                    self.store
                        .update_user_status(user.user_id, UserStatus::Active)
                        .await?;
                    Ok(Some(messages::onboarding_success()))
                } else {
                    Ok(Some(messages::onboarding_reminder()))
                }
            }
            UserStatus::Active => self.handle_active(&user, body.trim()).await,
            other => {
                warn!("Unhandled user status {:?} for user {}", other, user.user_id);
                Ok(None)
            }
        }
    }

    /// Level 2: route by conversational state.
    async fn handle_active(&self, user: &User, body: &str) -> Result<Option<String>> {
        let entry = self.states.get(user.user_id).await;

        match entry.state {
            ConversationState::Idle => self.handle_idle(user, body).await,
            ConversationState::AwaitingItemName => self.handle_item_name(user, body).await,
            ConversationState::AwaitingExpenseAmount => {
                self.handle_expense_amount(user, body, entry.context).await
            }
            ConversationState::AwaitingExpenseItem => {
                self.handle_expense_item(user, body, entry.context).await
            }
            ConversationState::AwaitingExpensePersons => {
                self.handle_expense_persons(user, body, entry.context).await
            }
        }
    }

    /// No conversation in progress: classify the message and dispatch by intent.
    async fn handle_idle(&self, user: &User, body: &str) -> Result<Option<String>> {
        let parsed = match self.nlp.parse(body).await {
            NlpOutcome::Parsed(parsed) => parsed,
            NlpOutcome::Unavailable => return Ok(Some(messages::fallback_unclear())),
        };

        let Some(tag) = parsed.intent.as_deref() else {
            return Ok(Some(messages::fallback_unclear()));
        };

        let entities = extract_entities(&parsed.entities);

        match Intent::from_tag(tag) {
            Intent::Greet => Ok(Some(messages::greeting())),
            Intent::Goodbye => Ok(Some(messages::farewell())),
            Intent::AddItem => {
                self.states
                    .set(
                        user.user_id,
                        StateEntry::awaiting(ConversationState::AwaitingItemName),
                    )
                    .await;
                Ok(Some(messages::ask_item_name()))
            }
            Intent::ListItems => {
                let items = self.store.get_items(user.user_id).await?;
                Ok(Some(messages::format_items_list(&items)))
            }
            Intent::LogPersonalExpense => self.handle_personal_expense(user, entities).await,
            Intent::LogSharedExpense => self
                .fill_and_maybe_commit(user, ExpenseContext::from(entities))
                .await
                .map(Some),
            Intent::QueryBalance => self.handle_balance_query(user, entities).await,
            Intent::Unknown => {
                debug!("Unhandled intent \"{}\" for user {}", tag, user.user_id);
                Ok(Some(messages::not_sure()))
            }
        }
    }

    /// Personal expenses are single-turn: both fields or a re-prompt.
    async fn handle_personal_expense(
        &self,
        user: &User,
        entities: ExtractedEntities,
    ) -> Result<Option<String>> {
        let (Some(amount), Some(item)) = (entities.amount, entities.item) else {
            return Ok(Some(messages::personal_expense_missing_fields()));
        };

        self.store
            .log_personal_expense(user.user_id, amount, &item)
            .await?;
        Ok(Some(messages::personal_expense_logged(&item, amount)))
    }

    async fn handle_balance_query(
        &self,
        user: &User,
        entities: ExtractedEntities,
    ) -> Result<Option<String>> {
        let Some(person) = entities.persons.first() else {
            return Ok(Some(messages::ask_balance_person()));
        };

        let total = self.store.query_balance(user.user_id, person).await?;
        Ok(Some(messages::balance_reply(person, total)))
    }

    /// Slot-filling orchestrator for shared expenses: one clarifying question
    /// per missing slot, in fixed priority amount -> item -> persons. Each
    /// follow-up turn merges its single new field into the stored context and
    /// re-enters here, so validation always restarts from amount.
    async fn fill_and_maybe_commit(&self, user: &User, context: ExpenseContext) -> Result<String> {
        let Some(amount) = context.amount else {
            let reply = messages::ask_expense_amount(context.item.as_deref(), &context.persons);
            self.states
                .set(
                    user.user_id,
                    StateEntry::new(
                        ConversationState::AwaitingExpenseAmount,
                        ExpenseContext {
                            amount: None,
                            item: context.item,
                            persons: context.persons,
                        },
                    ),
                )
                .await;
            return Ok(reply);
        };

        let Some(item) = context.item else {
            self.states
                .set(
                    user.user_id,
                    StateEntry::new(
                        ConversationState::AwaitingExpenseItem,
                        ExpenseContext {
                            amount: Some(amount),
                            item: None,
                            persons: context.persons,
                        },
                    ),
                )
                .await;
            return Ok(messages::ask_expense_item(amount));
        };

        if context.persons.is_empty() {
            self.states
                .set(
                    user.user_id,
                    StateEntry::new(
                        ConversationState::AwaitingExpensePersons,
                        ExpenseContext {
                            amount: Some(amount),
                            item: Some(item.clone()),
                            persons: vec![],
                        },
                    ),
                )
                .await;
            return Ok(messages::ask_expense_persons(&item, amount));
        }

        self.store
            .log_shared_expense(user.user_id, amount, &item, &context.persons)
            .await?;
        self.states.clear(user.user_id).await;

        Ok(messages::shared_expense_logged(&item, amount, &context.persons))
    }

    /// AWAITING_ITEM_NAME: the reply is the item name, length-capped at 100
    /// characters. Too long re-prompts without touching the stored state.
    async fn handle_item_name(&self, user: &User, body: &str) -> Result<Option<String>> {
        if body.chars().count() > 100 {
            return Ok(Some(messages::item_name_too_long()));
        }

        self.store.add_item(user.user_id, body).await?;
        self.states.clear(user.user_id).await;
        Ok(Some(messages::item_added(body)))
    }

    /// AWAITING_EXPENSE_AMOUNT: reinterpret the reply as a lone AMOUNT entity.
    async fn handle_expense_amount(
        &self,
        user: &User,
        body: &str,
        mut context: ExpenseContext,
    ) -> Result<Option<String>> {
        let fresh = extract_entities(&[RawEntity::new("AMOUNT", body)]);

        let Some(amount) = fresh.amount else {
            // Context stays as stored; the user just gets asked again.
            return Ok(Some(messages::invalid_amount()));
        };

        context.amount = Some(amount);
        self.fill_and_maybe_commit(user, context).await.map(Some)
    }

    /// AWAITING_EXPENSE_ITEM: the reply is the item, verbatim.
    async fn handle_expense_item(
        &self,
        user: &User,
        body: &str,
        mut context: ExpenseContext,
    ) -> Result<Option<String>> {
        context.item = Some(body.to_string());
        self.fill_and_maybe_commit(user, context).await.map(Some)
    }

    /// AWAITING_EXPENSE_PERSONS: reinterpret the reply as a lone PERSON entity,
    /// falling back to the whole body as a single name.
    async fn handle_expense_persons(
        &self,
        user: &User,
        body: &str,
        mut context: ExpenseContext,
    ) -> Result<Option<String>> {
        let fresh = extract_entities(&[RawEntity::new("PERSON", body)]);

        context.persons = if fresh.persons.is_empty() {
            vec![body.to_string()]
        } else {
            fresh.persons
        };

        self.fill_and_maybe_commit(user, context).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::memory::MemoryStateStore;
    use chrono::Utc;

    const PHONE: &str = "6512345678@c.us";

    fn user_with_status(status: UserStatus) -> User {
        User {
            user_id: 1,
            phone_number: PHONE.to_string(),
            status,
            created_at: Utc::now(),
        }
    }

    fn active_store() -> MockLedgerStore {
        let mut store = MockLedgerStore::new();
        store
            .expect_find_or_create_user()
            .returning(|_| Ok(user_with_status(UserStatus::Active)));
        store
    }

    fn nlp_returning(intent: &str, entities: Vec<RawEntity>) -> MockNlpProvider {
        let parsed = ParsedMessage {
            intent: Some(intent.to_string()),
            confidence: 0.9,
            entities,
        };
        let mut nlp = MockNlpProvider::new();
        nlp.expect_parse()
            .return_const(NlpOutcome::Parsed(parsed));
        nlp
    }

    fn dispatcher(
        store: MockLedgerStore,
        nlp: MockNlpProvider,
        states: &MemoryStateStore,
    ) -> Dispatcher {
        Dispatcher::new(Box::new(store), Box::new(states.clone()), Box::new(nlp))
    }

    #[tokio::test]
    async fn first_message_triggers_onboarding_regardless_of_content() {
        let mut store = MockLedgerStore::new();
        store
            .expect_find_or_create_user()
            .returning(|_| Ok(user_with_status(UserStatus::PendingOnboarding)));
        store
            .expect_update_user_status()
            .withf(|id, status| *id == 1 && *status == UserStatus::AwaitingConfirmation)
            .times(1)
            .returning(|_, _| Ok(()));

        let states = MemoryStateStore::default();
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "anything at all").await.unwrap();
        assert!(reply.unwrap().contains("TrustLedger"));
    }

    #[tokio::test]
    async fn only_the_yes_token_activates_the_account() {
        let mut store = MockLedgerStore::new();
        store
            .expect_find_or_create_user()
            .returning(|_| Ok(user_with_status(UserStatus::AwaitingConfirmation)));
        store
            .expect_update_user_status()
            .withf(|id, status| *id == 1 && *status == UserStatus::Active)
            .times(1)
            .returning(|_, _| Ok(()));

        let states = MemoryStateStore::default();
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "  YES ").await.unwrap();
        assert!(reply.unwrap().contains("active"));
    }

    #[tokio::test]
    async fn anything_but_yes_leaves_status_unchanged() {
        let mut store = MockLedgerStore::new();
        store
            .expect_find_or_create_user()
            .returning(|_| Ok(user_with_status(UserStatus::AwaitingConfirmation)));
        store.expect_update_user_status().times(0);

        let states = MemoryStateStore::default();
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "yes please").await.unwrap();
        assert!(reply.unwrap().contains("yes"));
    }

    #[tokio::test]
    async fn disabled_user_gets_no_reply_and_no_mutation() {
        let mut store = MockLedgerStore::new();
        store
            .expect_find_or_create_user()
            .returning(|_| Ok(user_with_status(UserStatus::Disabled)));
        store.expect_update_user_status().times(0);

        let states = MemoryStateStore::default();
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "hello").await.unwrap();
        assert!(reply.is_none());
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn nlp_outage_degrades_to_generic_reply() {
        let mut nlp = MockNlpProvider::new();
        nlp.expect_parse().return_const(NlpOutcome::Unavailable);

        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d.handle_message(PHONE, "spent 500 on lunch").await.unwrap();
        assert!(reply.unwrap().contains("didn't quite understand"));
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn missing_intent_degrades_to_generic_reply() {
        let mut nlp = MockNlpProvider::new();
        nlp.expect_parse().return_const(NlpOutcome::Parsed(ParsedMessage {
            intent: None,
            confidence: 0.0,
            entities: vec![],
        }));

        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d.handle_message(PHONE, "???").await.unwrap();
        assert!(reply.unwrap().contains("didn't quite understand"));
    }

    #[tokio::test]
    async fn unknown_intent_gets_a_fixed_reply() {
        let nlp = nlp_returning("tell_joke", vec![]);
        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d.handle_message(PHONE, "tell me a joke").await.unwrap();
        assert!(reply.unwrap().contains("not sure"));
    }

    #[tokio::test]
    async fn personal_expense_commits_in_a_single_turn() {
        let mut store = active_store();
        store
            .expect_log_personal_expense()
            .withf(|id, amount, item| *id == 1 && *amount == 500.0 && item == "groceries")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let nlp = nlp_returning(
            "log_personal_expense",
            vec![RawEntity::new("AMOUNT", "500"), RawEntity::new("ITEM", "groceries")],
        );
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let reply = d
            .handle_message(PHONE, "spent 500 on groceries")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("500"));
        assert!(reply.contains("groceries"));
        // Single-turn flow: conversation stays idle.
        assert_eq!(states.get(1).await.state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn personal_expense_with_missing_fields_reprompts() {
        let mut store = active_store();
        store.expect_log_personal_expense().times(0);

        let nlp = nlp_returning("log_personal_expense", vec![RawEntity::new("AMOUNT", "500")]);
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let reply = d.handle_message(PHONE, "spent 500").await.unwrap().unwrap();
        assert!(reply.contains("amount"));
        assert!(reply.contains("item"));
    }

    #[tokio::test]
    async fn shared_expense_without_persons_parks_in_awaiting_persons() {
        let nlp = nlp_returning(
            "log_shared_expense",
            vec![RawEntity::new("AMOUNT", "1000"), RawEntity::new("ITEM", "taxi")],
        );
        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d
            .handle_message(PHONE, "shared 1000 for a taxi")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("Who"));

        let entry = states.get(1).await;
        assert_eq!(entry.state, ConversationState::AwaitingExpensePersons);
        assert_eq!(entry.context.amount, Some(1000.0));
        assert_eq!(entry.context.item.as_deref(), Some("taxi"));
        assert!(entry.context.persons.is_empty());
    }

    #[tokio::test]
    async fn persons_follow_up_commits_the_shared_expense() {
        let mut store = active_store();
        store
            .expect_log_shared_expense()
            .withf(|id, amount, item, persons| {
                *id == 1
                    && *amount == 1000.0
                    && item == "taxi"
                    && persons.len() == 1
                    && persons[0] == "Kamal"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let nlp = nlp_returning(
            "log_shared_expense",
            vec![RawEntity::new("AMOUNT", "1000"), RawEntity::new("ITEM", "taxi")],
        );
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        d.handle_message(PHONE, "shared 1000 for a taxi").await.unwrap();
        let reply = d.handle_message(PHONE, "Kamal").await.unwrap().unwrap();

        assert!(reply.contains("Kamal"));
        assert_eq!(states.get(1).await.state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn slot_filling_commits_the_same_record_in_any_order() {
        // Start with one slot, answer the prompts for the other two; the
        // committed record must not depend on which slot came first.
        let scenarios: Vec<(Vec<RawEntity>, Vec<&str>)> = vec![
            (vec![RawEntity::new("AMOUNT", "1000")], vec!["taxi", "Kamal"]),
            (vec![RawEntity::new("ITEM", "taxi")], vec!["1000", "Kamal"]),
            (vec![RawEntity::new("PERSON", "Kamal")], vec!["1000", "taxi"]),
        ];

        for (initial_entities, follow_ups) in scenarios {
            let mut store = active_store();
            store
                .expect_log_shared_expense()
                .withf(|id, amount, item, persons| {
                    *id == 1
                        && *amount == 1000.0
                        && item == "taxi"
                        && persons.len() == 1
                        && persons[0] == "Kamal"
                })
                .times(1)
                .returning(|_, _, _, _| Ok(()));

            let nlp = nlp_returning("log_shared_expense", initial_entities);
            let states = MemoryStateStore::default();
            let d = dispatcher(store, nlp, &states);

            d.handle_message(PHONE, "shared expense").await.unwrap();
            for follow_up in follow_ups {
                d.handle_message(PHONE, follow_up).await.unwrap();
            }

            assert_eq!(states.get(1).await.state, ConversationState::Idle);
        }
    }

    #[tokio::test]
    async fn unparseable_amount_follow_up_keeps_the_stored_context() {
        let states = MemoryStateStore::default();
        let context = ExpenseContext {
            amount: None,
            item: Some("taxi".to_string()),
            persons: vec!["Kamal".to_string()],
        };
        states
            .set(
                1,
                StateEntry::new(ConversationState::AwaitingExpenseAmount, context.clone()),
            )
            .await;

        let d = dispatcher(active_store(), MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "plenty").await.unwrap().unwrap();
        assert!(reply.contains("amount"));

        let entry = states.get(1).await;
        assert_eq!(entry.state, ConversationState::AwaitingExpenseAmount);
        assert_eq!(entry.context, context);
    }

    #[tokio::test]
    async fn add_item_intent_opens_the_item_dialogue() {
        let nlp = nlp_returning("add_item", vec![]);
        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d.handle_message(PHONE, "add item").await.unwrap().unwrap();
        assert!(reply.contains("item"));
        assert_eq!(states.get(1).await.state, ConversationState::AwaitingItemName);
    }

    #[tokio::test]
    async fn item_name_reply_persists_the_item_and_resets() {
        let mut store = active_store();
        store
            .expect_add_item()
            .withf(|id, name| *id == 1 && name == "Coffee")
            .times(1)
            .returning(|user_id, name| {
                Ok(TrackableItem {
                    item_id: 1,
                    user_id,
                    item_name: name.to_string(),
                    created_at: Utc::now(),
                })
            });

        let states = MemoryStateStore::default();
        states
            .set(1, StateEntry::awaiting(ConversationState::AwaitingItemName))
            .await;
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let reply = d.handle_message(PHONE, "  Coffee ").await.unwrap().unwrap();
        assert!(reply.contains("Coffee"));
        assert_eq!(states.get(1).await.state, ConversationState::Idle);
    }

    #[tokio::test]
    async fn overlong_item_name_is_rejected_and_state_kept() {
        let mut store = active_store();
        store.expect_add_item().times(0);

        let states = MemoryStateStore::default();
        states
            .set(1, StateEntry::awaiting(ConversationState::AwaitingItemName))
            .await;
        let d = dispatcher(store, MockNlpProvider::new(), &states);

        let name = "x".repeat(101);
        let reply = d.handle_message(PHONE, &name).await.unwrap().unwrap();
        assert!(reply.contains("shorter"));
        assert_eq!(states.get(1).await.state, ConversationState::AwaitingItemName);
    }

    #[tokio::test]
    async fn expense_item_follow_up_is_taken_verbatim() {
        let states = MemoryStateStore::default();
        states
            .set(
                1,
                StateEntry::new(
                    ConversationState::AwaitingExpenseItem,
                    ExpenseContext {
                        amount: Some(1000.0),
                        item: None,
                        persons: vec![],
                    },
                ),
            )
            .await;

        let d = dispatcher(active_store(), MockNlpProvider::new(), &states);
        // No length cap in this state; a 101-char item is accepted as-is.
        let long_item = "y".repeat(101);
        d.handle_message(PHONE, &long_item).await.unwrap();

        let entry = states.get(1).await;
        assert_eq!(entry.state, ConversationState::AwaitingExpensePersons);
        assert_eq!(entry.context.item.as_deref(), Some(long_item.as_str()));
    }

    #[tokio::test]
    async fn list_items_replies_with_the_numbered_list() {
        let mut store = active_store();
        store.expect_get_items().returning(|user_id| {
            Ok(vec![TrackableItem {
                item_id: 1,
                user_id,
                item_name: "Coffee".to_string(),
                created_at: Utc::now(),
            }])
        });

        let nlp = nlp_returning("list_items", vec![]);
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let reply = d.handle_message(PHONE, "show my items").await.unwrap().unwrap();
        assert!(reply.contains("1. Coffee"));
    }

    #[tokio::test]
    async fn balance_query_without_person_asks_which_one() {
        let nlp = nlp_returning("query_balance", vec![]);
        let states = MemoryStateStore::default();
        let d = dispatcher(active_store(), nlp, &states);

        let reply = d.handle_message(PHONE, "what's my balance").await.unwrap().unwrap();
        assert!(reply.contains("Whose"));
    }

    #[tokio::test]
    async fn balance_query_uses_the_first_person_and_formats_the_total() {
        let mut store = active_store();
        store
            .expect_query_balance()
            .withf(|id, person| *id == 1 && person == "Kamal")
            .returning(|_, _| Ok(750.0));

        let nlp = nlp_returning(
            "query_balance",
            vec![RawEntity::new("PERSON", "Kamal"), RawEntity::new("PERSON", "Nimal")],
        );
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let reply = d
            .handle_message(PHONE, "balance with Kamal")
            .await
            .unwrap()
            .unwrap();
        assert!(reply.contains("Kamal"));
        assert!(reply.contains("750"));
    }

    #[tokio::test]
    async fn balance_with_no_shared_records_is_zero_not_an_error() {
        let mut store = active_store();
        store.expect_query_balance().returning(|_, _| Ok(0.0));

        let nlp = nlp_returning("query_balance", vec![RawEntity::new("PERSON", "Sunil")]);
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let reply = d.handle_message(PHONE, "balance with Sunil").await.unwrap().unwrap();
        assert!(reply.contains('0'));
    }

    #[tokio::test]
    async fn persistence_failure_propagates_to_the_caller() {
        let mut store = active_store();
        store
            .expect_log_personal_expense()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));

        let nlp = nlp_returning(
            "log_personal_expense",
            vec![RawEntity::new("AMOUNT", "500"), RawEntity::new("ITEM", "lunch")],
        );
        let states = MemoryStateStore::default();
        let d = dispatcher(store, nlp, &states);

        let result = d.handle_message(PHONE, "spent 500 on lunch").await;
        assert!(result.is_err());
    }
}
