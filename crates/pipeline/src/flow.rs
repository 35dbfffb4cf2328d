//! The two-phase categorization flow: ingest an expense and ask for its
//! category, then resolve the user's reply.

use std::sync::Arc;

use database::{category, customer, expense, Database, Expense, NewExpense};
use expense_core::{
    heuristic_match, validate_candidate, CategoryClassifier, ChannelTransport, IncomingMessage,
    MessageGenerator, MessageRequest, TransactionExtractor,
};
use tracing::{debug, error, info, warn};

use crate::authorize::ChannelAuthorizer;
use crate::config::PipelineConfig;
use crate::conversation::ConversationStore;
use crate::error::PipelineError;

/// Sent when a reply does not clear the confidence gate.
pub const CLARIFY_CATEGORY_MESSAGE: &str =
    "No me quedó clara la categoría. ¿Puedes elegir una más específica?";

/// The model-backed collaborators of the flow.
#[derive(Clone)]
pub struct AiPorts {
    pub extractor: Arc<dyn TransactionExtractor>,
    pub classifier: Arc<dyn CategoryClassifier>,
    pub generator: Arc<dyn MessageGenerator>,
}

/// Result of resolving a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub categorized: bool,
}

impl ReplyOutcome {
    fn categorized() -> Self {
        Self { categorized: true }
    }

    fn pending() -> Self {
        Self { categorized: false }
    }
}

/// Ingestion and reply resolution over a shared database and AI ports.
///
/// The transport is passed per call, so one flow serves every channel.
pub struct ExpenseFlow {
    db: Database,
    ai: AiPorts,
    authorizer: ChannelAuthorizer,
    conversations: ConversationStore,
    config: PipelineConfig,
}

impl ExpenseFlow {
    pub fn new(db: Database, ai: AiPorts, config: PipelineConfig) -> Self {
        let authorizer = ChannelAuthorizer::new(
            db.clone(),
            config.strict_policy_mode,
            config.entitlement_cache_ttl,
        );
        let conversations = ConversationStore::new(db.clone(), config.conversation_ttl);

        Self {
            db,
            ai,
            authorizer,
            conversations,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn authorizer(&self) -> &ChannelAuthorizer {
        &self.authorizer
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extract an expense from text, persist it as pending and ask the user
    /// for its category.
    ///
    /// Returns `Ok(None)` when the text holds no transaction.
    pub async fn ingest(
        &self,
        customer_id: &str,
        source_text: &str,
        transport: &dyn ChannelTransport,
        user_id: &str,
    ) -> Result<Option<Expense>, PipelineError> {
        let channel = transport.channel();
        let input: String = source_text.chars().take(self.config.max_input_chars).collect();

        let candidate = self
            .ai
            .extractor
            .extract_transaction(&input)
            .await
            .map_err(PipelineError::Extraction)?;

        let Some(candidate) = candidate else {
            warn!(customer_id, channel, "expense.no_transaction_found");
            return Ok(None);
        };

        let candidate = candidate.normalized();
        if let Err(rejection) = validate_candidate(&candidate) {
            warn!(customer_id, channel, reason = %rejection, "expense.invalid_transaction");
            return Err(PipelineError::InvalidTransaction(rejection));
        }

        let raw_text = if candidate.raw_text.trim().is_empty() {
            input.clone()
        } else {
            candidate.raw_text.clone()
        };

        let expense = expense::create_pending(
            self.db.pool(),
            &NewExpense {
                customer_id: customer_id.to_string(),
                amount: candidate.amount,
                currency: candidate.currency.clone(),
                merchant: candidate.merchant.clone(),
                occurred_at: candidate.date.clone(),
                bank: candidate.bank.clone(),
                raw_text,
            },
        )
        .await
        .map_err(|source| PipelineError::ExpensePersistence {
            op: "createPending",
            source,
        })?;

        self.conversations
            .put(customer_id, channel, user_id, &expense.id)
            .await?;

        let text = self
            .generate(&MessageRequest::AskCategory {
                amount: expense.amount,
                currency: expense.currency.clone(),
                merchant: expense.merchant.clone(),
            })
            .await?;

        self.authorizer.authorize(customer_id, channel).await?;

        transport
            .send_message(user_id, &text)
            .await
            .map_err(PipelineError::ChannelSend)?;

        info!(
            customer_id,
            channel,
            expense_id = %expense.id,
            "expense.pending_category_created"
        );

        Ok(Some(expense))
    }

    /// Treat a message as the answer to the open category question.
    pub async fn resolve_reply(
        &self,
        customer_id: &str,
        message: &IncomingMessage,
        transport: &dyn ChannelTransport,
    ) -> Result<ReplyOutcome, PipelineError> {
        let channel = message.channel.as_str();
        let user_id = message.user_id.as_str();

        let Some(state) = self.conversations.get(customer_id, channel, user_id).await? else {
            warn!(customer_id, channel, "conversation.no_pending_state");
            return Ok(ReplyOutcome::pending());
        };

        let pending = expense::get_by_id(self.db.pool(), &state.expense_id, customer_id)
            .await
            .map_err(|source| PipelineError::ExpensePersistence { op: "getById", source })?;

        let Some(pending) = pending else {
            error!(
                customer_id,
                channel,
                expense_id = %state.expense_id,
                "expense.not_found_for_reply"
            );
            self.conversations.delete(customer_id, channel, user_id).await?;
            return Ok(ReplyOutcome::pending());
        };

        let categories = category::list_for_customer(self.db.pool(), customer_id)
            .await
            .map_err(|source| PipelineError::CategoryLookup { op: "listAll", source })?;

        let classification = match heuristic_match(&message.text, &categories) {
            Some(matched) => matched,
            None => self
                .ai
                .classifier
                .classify_category(&message.text, &categories)
                .await
                .map_err(PipelineError::Classification)?,
        };

        let threshold = self.threshold_for(customer_id).await?;
        debug!(
            customer_id,
            category_id = ?classification.category_id,
            confidence = classification.confidence,
            threshold,
            "category.classified"
        );

        let category_id = match classification.category_id.as_ref() {
            Some(id) if classification.passes(threshold) => id.clone(),
            _ => {
                self.authorizer.authorize(customer_id, channel).await?;
                transport
                    .send_message(user_id, CLARIFY_CATEGORY_MESSAGE)
                    .await
                    .map_err(PipelineError::ChannelSend)?;
                info!(customer_id, channel, expense_id = %pending.id, "category.low_confidence");
                return Ok(ReplyOutcome::pending());
            }
        };

        let resolved = category::get_by_id(self.db.pool(), customer_id, &category_id)
            .await
            .map_err(|source| PipelineError::CategoryLookup { op: "getById", source })?;

        let Some(resolved) = resolved else {
            warn!(customer_id, category_id = %category_id, "category.not_found");
            return Ok(ReplyOutcome::pending());
        };

        let updated = expense::mark_categorized(self.db.pool(), &pending.id, customer_id, &resolved.id)
            .await
            .map_err(|source| PipelineError::ExpensePersistence {
                op: "markCategorized",
                source,
            })?;

        if !updated {
            warn!(customer_id, expense_id = %pending.id, "expense.already_categorized");
            self.conversations.delete(customer_id, channel, user_id).await?;
            return Ok(ReplyOutcome::pending());
        }

        self.complete(customer_id, channel, user_id, &pending.id, &resolved.name, transport)
            .await?;

        Ok(ReplyOutcome::categorized())
    }

    /// Close the conversation and confirm the category to the user.
    async fn complete(
        &self,
        customer_id: &str,
        channel: &str,
        user_id: &str,
        expense_id: &str,
        category_name: &str,
        transport: &dyn ChannelTransport,
    ) -> Result<(), PipelineError> {
        self.conversations.delete(customer_id, channel, user_id).await?;

        let text = self
            .generate(&MessageRequest::Confirmation {
                category_name: category_name.to_string(),
            })
            .await?;

        self.authorizer.authorize(customer_id, channel).await?;

        transport
            .send_message(user_id, &text)
            .await
            .map_err(PipelineError::ChannelSend)?;

        info!(customer_id, channel, expense_id, category = category_name, "expense.flow_completed");
        Ok(())
    }

    async fn generate(&self, request: &MessageRequest) -> Result<String, PipelineError> {
        self.ai
            .generator
            .generate_message(request)
            .await
            .map_err(PipelineError::MessageGeneration)
    }

    async fn threshold_for(&self, customer_id: &str) -> Result<f64, PipelineError> {
        let record = customer::get_customer(self.db.pool(), customer_id)
            .await
            .map_err(|source| PipelineError::CategoryLookup {
                op: "getCustomer",
                source,
            })?;

        Ok(self
            .config
            .threshold_for(record.and_then(|c| c.confidence_threshold)))
    }
}
