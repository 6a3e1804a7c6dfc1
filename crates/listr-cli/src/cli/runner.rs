//! Sandbox event loop.
//!
//! Reads one JSON [`Request`] per line, plays it against an in-memory
//! channel host through [`Listr`], and answers each with one JSON
//! [`Response`] line.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use listr_core::models::{ChannelId, Message};
use listr_core::{
    ActionOutcome, InteractionEvent, Item, Listr, ListrConfig, ListrError, MemoryStore,
    MessageOutcome, ReactionEvent, ReactionKind,
};

use super::protocol::{CommandParams, MessageParams, Request, Response, ShowParams};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Pretty-print each response
    pub pretty: bool,
    /// Spawn every event as its own task instead of awaiting it in turn
    pub concurrent: bool,
}

#[derive(Clone)]
pub struct Runner {
    store: Arc<MemoryStore>,
    listr: Arc<Listr>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(config: ListrConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let listr = Listr::with_retries(store.clone(), config);
        Self {
            store,
            listr: Arc::new(listr),
            cancel: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Stop in-flight scans before their next mutation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Play every event line from `input`, writing responses to `output`.
    /// Returns the number of events read.
    pub async fn run<R, W>(&self, input: R, output: &mut W, options: RunOptions) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut tasks = JoinSet::new();
        let mut count = 0;

        while let Some(line) = lines.next_line().await.context("Failed to read event")? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            count += 1;

            let request: Request = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    let response = Response::error(0, "PARSE_ERROR", &e.to_string());
                    write_response(output, &response, options.pretty).await?;
                    continue;
                }
            };

            if options.concurrent {
                let runner = self.clone();
                tasks.spawn(async move { runner.handle(request).await });
            } else {
                let response = self.handle(request).await;
                write_response(output, &response, options.pretty).await?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let response = joined.context("Event task panicked")?;
            write_response(output, &response, options.pretty).await?;
        }
        output.flush().await?;

        info!(events = count, "Script finished");
        Ok(count)
    }

    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id;
        debug!(id, method = %request.method, "Handling event");

        let result = match request.method.as_str() {
            "message" => match parse_params::<MessageParams>(&request) {
                Ok(params) => self.message(params).await,
                Err(response) => return response,
            },
            "interaction" => match parse_params::<InteractionEvent>(&request) {
                Ok(event) => self
                    .listr
                    .on_interaction(&event)
                    .await
                    .map(action_json),
                Err(response) => return response,
            },
            "reaction" => match parse_params::<ReactionEvent>(&request) {
                Ok(event) => self.reaction(event).await,
                Err(response) => return response,
            },
            "command" => match parse_params::<CommandParams>(&request) {
                Ok(params) => {
                    let cancel = self.cancel.child_token();
                    let outcome = self
                        .listr
                        .run_command(params.channel, params.command, &cancel)
                        .await;
                    Ok(serde_json::json!(outcome))
                }
                Err(response) => return response,
            },
            "show" => match parse_params::<ShowParams>(&request) {
                Ok(params) => Ok(self.show(params.channel)),
                Err(response) => return response,
            },
            _ => {
                return Response::error(
                    id,
                    "UNKNOWN_METHOD",
                    &format!("Unknown method: {}", request.method),
                )
            }
        };

        match result {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::from_listr_error(id, &e),
        }
    }

    async fn message(&self, params: MessageParams) -> Result<serde_json::Value, ListrError> {
        let message = self
            .store
            .post_user_message(params.channel, params.author, &params.content);
        let cancel = self.cancel.child_token();
        let outcome = self.listr.on_message(message, &cancel).await?;
        Ok(match outcome {
            MessageOutcome::Ignored => serde_json::json!({ "outcome": "ignored" }),
            MessageOutcome::Itemized { item, duplicates } => serde_json::json!({
                "outcome": "itemized",
                "item": item_json(&item),
                "duplicates": duplicates,
            }),
            MessageOutcome::Command(outcome) => serde_json::json!({
                "outcome": "command",
                "command": outcome,
            }),
        })
    }

    /// Apply the reaction to the channel host, then let the bot see it.
    async fn reaction(&self, event: ReactionEvent) -> Result<serde_json::Value, ListrError> {
        self.store.toggle_reaction(
            event.channel,
            event.message,
            event.user,
            event.emoji.clone(),
            event.kind == ReactionKind::Added,
        )?;
        self.listr.on_reaction(&event).await.map(action_json)
    }

    fn show(&self, channel: ChannelId) -> serde_json::Value {
        let messages: Vec<_> = self
            .store
            .messages(channel)
            .iter()
            .map(message_json)
            .collect();
        serde_json::json!({ "channel": channel, "messages": messages })
    }
}

fn parse_params<T: DeserializeOwned>(request: &Request) -> Result<T, Response> {
    serde_json::from_value(request.params.clone())
        .map_err(|e| Response::error(request.id, "INVALID_PARAMS", &e.to_string()))
}

fn item_json(item: &Item) -> serde_json::Value {
    serde_json::json!({
        "id": item.id(),
        "content": item.content(),
        "done": !item.done_state().is_open(),
        "struck": item.is_struck(),
    })
}

fn action_json(outcome: ActionOutcome) -> serde_json::Value {
    match outcome {
        ActionOutcome::Ignored => serde_json::json!({ "outcome": "ignored" }),
        ActionOutcome::Updated(item) => {
            serde_json::json!({ "outcome": "updated", "item": item_json(&item) })
        }
        ActionOutcome::Deleted(id) => serde_json::json!({ "outcome": "deleted", "id": id }),
    }
}

fn message_json(message: &Message) -> serde_json::Value {
    let reactions: Vec<_> = message
        .reactions
        .iter()
        .map(|r| serde_json::json!({ "emoji": r.id(), "count": r.count }))
        .collect();
    match &message.form {
        Some(form) => serde_json::json!({
            "id": message.id,
            "author": message.author.name,
            "body": form.body,
            "colour": form.colour.map(|c| c.to_string()),
            "reactions": reactions,
        }),
        None => serde_json::json!({
            "id": message.id,
            "author": message.author.name,
            "content": message.content,
        }),
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    output: &mut W,
    response: &Response,
    pretty: bool,
) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    output.write_all(json.as_bytes()).await?;
    output.write_all(b"\n").await?;
    Ok(())
}
