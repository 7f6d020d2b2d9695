use chrono::Utc;
use localbook_core_types::{AnswerMessage, AnswerUpdate};
use log::debug;

/// Handle of one question/answer pair in a [`Conversation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

#[derive(Debug)]
struct Exchange {
    id: ExchangeId,
    assistant_index: usize,
    abandoned: bool,
    finished: bool,
}

/// Ordered message list of one notebook chat.
///
/// Each submitted question gets its assistant slot immediately; session updates
/// are routed to that slot only. Updates for an abandoned exchange are dropped.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<AnswerMessage>,
    exchanges: Vec<Exchange>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[AnswerMessage] {
        &self.messages
    }

    /// Appends the user message and an empty assistant slot.
    pub fn submit(&mut self, question: impl Into<String>, timestamp_ms: i64) -> ExchangeId {
        let id = ExchangeId(self.next_id);
        self.next_id += 1;

        self.messages.push(AnswerMessage::user(question, timestamp_ms));
        self.messages.push(AnswerMessage::assistant(timestamp_ms));
        self.exchanges.push(Exchange {
            id,
            assistant_index: self.messages.len() - 1,
            abandoned: false,
            finished: false,
        });
        id
    }

    pub fn submit_now(&mut self, question: impl Into<String>) -> ExchangeId {
        self.submit(question, Utc::now().timestamp_millis())
    }

    pub fn assistant(&self, id: ExchangeId) -> Option<&AnswerMessage> {
        self.exchange(id)
            .and_then(|exchange| self.messages.get(exchange.assistant_index))
    }

    pub fn is_active(&self, id: ExchangeId) -> bool {
        self.exchange(id)
            .is_some_and(|exchange| !exchange.abandoned && !exchange.finished)
    }

    /// Question to re-ask with web search, once `id` finished with a weak answer.
    pub fn pending_web_search(&self, id: ExchangeId) -> Option<&str> {
        let exchange = self.exchange(id)?;
        if !exchange.finished || exchange.abandoned {
            return None;
        }
        self.messages
            .get(exchange.assistant_index)?
            .low_confidence_query
            .as_deref()
    }

    /// Routes a session update to its exchange. Returns false when dropped.
    pub fn apply(&mut self, id: ExchangeId, update: &AnswerUpdate) -> bool {
        let Some(exchange) = self.exchanges.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if exchange.abandoned || exchange.finished {
            debug!("Dropping update for closed exchange {:?}", id);
            return false;
        }
        let Some(slot) = self.messages.get_mut(exchange.assistant_index) else {
            return false;
        };

        match update {
            AnswerUpdate::Status { message } => slot.status_message = Some(message.clone()),
            AnswerUpdate::Citations { citations, .. } => slot.citations = citations.clone(),
            AnswerUpdate::QuickSummary { content } => slot.quick_summary = Some(content.clone()),
            AnswerUpdate::Content { content } => slot.content = content.clone(),
            AnswerUpdate::Completed { message } | AnswerUpdate::Failed { message, .. } => {
                *slot = message.clone();
                exchange.finished = true;
            }
            AnswerUpdate::Mode { .. } | AnswerUpdate::StopLoading => {}
        }
        true
    }

    /// Stops routing updates to `id`; the message keeps what it had.
    pub fn abandon(&mut self, id: ExchangeId) {
        if let Some(exchange) = self.exchanges.iter_mut().find(|e| e.id == id) {
            exchange.abandoned = true;
        }
    }

    fn exchange(&self, id: ExchangeId) -> Option<&Exchange> {
        self.exchanges.iter().find(|e| e.id == id)
    }
}
