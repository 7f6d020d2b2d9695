use super::drive_options;
use super::interrupt::Interrupts;
use crate::ui::AnswerPrinter;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use localbook_core::infrastructure::backend::StreamEndpoint;
use localbook_core::{
    drive_session, AnswerSession, BackendClient, Conversation, ExchangeId, SessionOutcome,
    StreamConfig, StreamFailure,
};
use localbook_core_types::ChatQuery;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    /// Notebook to search
    #[arg(short, long)]
    pub notebook: String,

    /// Restrict retrieval to these source ids
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Number of passages to retrieve
    #[arg(long)]
    pub top_k: Option<u32>,

    /// LLM provider override
    #[arg(long)]
    pub provider: Option<String>,

    /// Ask for slower, multi-step reasoning
    #[arg(long)]
    pub deep_think: bool,

    /// Let the backend search the web as well
    #[arg(long)]
    pub web_search: bool,

    /// Never decompose complex questions
    #[arg(long)]
    pub no_orchestrator: bool,
}

impl AskArgs {
    fn query(&self, question: &str) -> ChatQuery {
        let mut query = ChatQuery::new(self.notebook.clone(), question);
        if !self.sources.is_empty() {
            query.source_ids = Some(self.sources.clone());
        }
        query.top_k = self.top_k;
        query.llm_provider = self.provider.clone();
        query.deep_think = self.deep_think;
        query.enable_web_search = self.web_search;
        if self.no_orchestrator {
            query.use_orchestrator = Some(false);
        }
        query
    }
}

/// Answers one question.
pub async fn run(
    args: &AskArgs,
    question: &str,
    config: StreamConfig,
    interrupts: &Interrupts,
) -> Result<()> {
    let client = BackendClient::new(config)?;
    let mut conversation = Conversation::new();
    let query = args.query(question);
    let (exchange, outcome) = answer(&client, args, &mut conversation, query, interrupts).await?;
    if let Some(retry) = conversation.pending_web_search(exchange) {
        if !args.web_search {
            eprintln!("Re-run with --web-search to search the web for \"{}\"", retry);
        }
    }
    match outcome {
        SessionOutcome::Completed => Ok(()),
        SessionOutcome::Failed(failure) => Err(anyhow!("answer failed: {}", failure)),
    }
}

/// Reads questions from stdin until EOF, keeping them in one conversation.
///
/// After a weakly grounded answer, a `y` reply re-asks it with web search.
pub async fn chat(args: &AskArgs, config: StreamConfig, interrupts: &Interrupts) -> Result<()> {
    let client = BackendClient::new(config)?;
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut offered: Option<String> = None;

    eprintln!("Ask about notebook {} (Ctrl-D to quit)", args.notebook);
    while let Some(line) = lines.next_line().await.context("read question")? {
        let reply = line.trim();
        let query = match offered.take() {
            Some(retry) if is_yes(reply) => args.query(&retry).with_web_search(),
            _ if reply.is_empty() => continue,
            _ => args.query(reply),
        };
        let searched_web = query.enable_web_search;

        match answer(&client, args, &mut conversation, query, interrupts).await {
            Ok((_, SessionOutcome::Failed(StreamFailure::Cancelled))) => {
                eprintln!("(cancelled)");
            }
            Ok((exchange, _)) if !searched_web => {
                if let Some(retry) = conversation.pending_web_search(exchange) {
                    eprint!("Search the web for this? [y/N] ");
                    offered = Some(retry.to_string());
                }
            }
            Ok(_) => {}
            Err(e) => eprintln!("error: {:#}", e),
        }
    }
    info!(
        "Chat ended: messages={}",
        conversation.messages().len()
    );
    Ok(())
}

fn is_yes(reply: &str) -> bool {
    matches!(reply.to_lowercase().as_str(), "y" | "yes")
}

async fn answer(
    client: &BackendClient,
    args: &AskArgs,
    conversation: &mut Conversation,
    query: ChatQuery,
    interrupts: &Interrupts,
) -> Result<(ExchangeId, SessionOutcome)> {
    let config = client.config().clone();
    let exchange = conversation.submit_now(query.question.clone());
    let timestamp_ms = conversation
        .assistant(exchange)
        .map(|m| m.timestamp_ms)
        .unwrap_or_default();

    let stream = match client.open_answer_stream(&query).await {
        Ok(stream) => stream,
        Err(e) => {
            conversation.abandon(exchange);
            return Err(e).context("open answer stream");
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session =
        AnswerSession::new(args.notebook.clone(), query.question.clone(), timestamp_ms)
            .with_flush_interval(config.token_flush_interval())
            .with_updates(tx);
    if config.record_explorations {
        session = session.with_recorder(Arc::new(client.exploration_recorder()));
    }

    let armed = interrupts.arm();
    let options = drive_options(&config, StreamEndpoint::Answer, armed.token());
    let drive = async move {
        let run = drive_session(session, stream, options).await;
        // Dropping the session closes the update channel.
        run.outcome
    };
    let render = async {
        let mut printer = AnswerPrinter::new();
        while let Some(update) = rx.recv().await {
            conversation.apply(exchange, &update);
            if let Err(e) = printer.handle(&update) {
                warn!("Failed to write answer output: {}", e);
            }
        }
    };

    let (outcome, ()) = tokio::join!(drive, render);
    drop(armed);
    if outcome == SessionOutcome::Failed(StreamFailure::Cancelled) {
        conversation.abandon(exchange);
    }
    Ok((exchange, outcome))
}
