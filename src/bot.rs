//! Bot main loop: receives channel messages and drives conversations.
//!
//! Messages are dispatched to one worker task per session, so a chat is
//! handled strictly in order while other chats proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channels::{ChannelManager, IncomingMessage, StatusUpdate};
use crate::config::BotConfig;
use crate::conversation::{ConversationEvent, ConversationManager, ProgressSink};
use crate::error::ChannelError;

/// Forwards progress notices to the chat a message came from.
struct ChannelProgress<'a> {
    channels: &'a ChannelManager,
    msg: &'a IncomingMessage,
}

#[async_trait]
impl ProgressSink for ChannelProgress<'_> {
    async fn notify(&self, update: StatusUpdate) {
        if let Err(e) = self
            .channels
            .send_status(&self.msg.channel, update, &self.msg.metadata)
            .await
        {
            tracing::debug!(channel = %self.msg.channel, error = %e, "Progress notice not delivered");
        }
    }
}

struct SessionWorker {
    tx: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// The bot: channels in, conversation steps, replies out.
pub struct Bot {
    config: BotConfig,
    channels: Arc<ChannelManager>,
    conversations: Arc<ConversationManager>,
}

impl Bot {
    pub fn new(config: BotConfig, channels: ChannelManager, conversations: ConversationManager) -> Self {
        Self {
            config,
            channels: Arc::new(channels),
            conversations: Arc::new(conversations),
        }
    }

    /// Run until Ctrl+C or until every channel stream ends.
    ///
    /// On exit, queued messages are finished before channels shut down.
    pub async fn run(self) -> Result<(), ChannelError> {
        let mut message_stream = self.channels.start_all().await?;
        let mut workers: HashMap<String, SessionWorker> = HashMap::new();

        let mut prune = tokio::time::interval(self.config.prune_interval);
        prune.tick().await; // Skip immediate first tick

        tracing::info!(bot = %self.config.name, channels = ?self.channels.names(), "Bot ready and listening");

        loop {
            tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                _ = prune.tick() => {
                    self.conversations
                        .sessions()
                        .evict_idle(self.config.session_idle_timeout)
                        .await;
                    workers.retain(|_, w| !w.tx.is_closed());
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => self.dispatch(&mut workers, m),
                        None => {
                            tracing::info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(workers = workers.len(), "Draining session workers");
        let handles: Vec<_> = workers.into_values().map(|w| w.handle).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Session worker panicked");
            }
        }

        self.channels.shutdown_all().await?;
        Ok(())
    }

    /// Queue `msg` on its session's worker, starting one if needed.
    fn dispatch(&self, workers: &mut HashMap<String, SessionWorker>, msg: IncomingMessage) {
        let key = msg.session_key();
        let msg = match workers.get(&key) {
            Some(worker) => match worker.tx.send(msg) {
                Ok(()) => return,
                // Worker went idle and closed; start a new one.
                Err(mpsc::error::SendError(msg)) => msg,
            },
            None => msg,
        };

        let worker = self.spawn_worker(key.clone());
        if worker.tx.send(msg).is_err() {
            tracing::warn!(session = %key, "Fresh session worker rejected message");
        }
        workers.insert(key, worker);
    }

    fn spawn_worker(&self, key: String) -> SessionWorker {
        let (tx, mut rx) = mpsc::unbounded_channel::<IncomingMessage>();
        let channels = Arc::clone(&self.channels);
        let conversations = Arc::clone(&self.conversations);
        let idle = self.config.session_idle_timeout;

        let handle = tokio::spawn(async move {
            tracing::debug!(session = %key, "Session worker started");
            while let Some(msg) = next_or_idle(&mut rx, idle).await {
                process_message(&channels, &conversations, msg).await;
            }
            // Anything queued before the close still gets an answer.
            while let Ok(msg) = rx.try_recv() {
                process_message(&channels, &conversations, msg).await;
            }
            tracing::debug!(session = %key, "Session worker stopped");
        });

        SessionWorker { tx, handle }
    }
}

/// Next queued message, or `None` once the queue is closed or idle for `idle`.
/// An idle queue is closed so later sends fail and start a new worker.
async fn next_or_idle(
    rx: &mut mpsc::UnboundedReceiver<IncomingMessage>,
    idle: Duration,
) -> Option<IncomingMessage> {
    match tokio::time::timeout(idle, rx.recv()).await {
        Ok(msg) => msg,
        Err(_) => {
            rx.close();
            None
        }
    }
}

async fn process_message(
    channels: &ChannelManager,
    conversations: &ConversationManager,
    msg: IncomingMessage,
) {
    let session_key = msg.session_key();
    tracing::debug!(
        session = %session_key,
        user = %msg.user_id,
        button = msg.callback_data.is_some(),
        "Received message"
    );

    let event = ConversationEvent::from_message(&msg);
    let progress = ChannelProgress {
        channels,
        msg: &msg,
    };
    let replies = conversations.handle(&session_key, event, &progress).await;

    for reply in replies {
        if let Err(e) = channels.respond(&msg, reply).await {
            tracing::error!(session = %session_key, error = %e, "Failed to deliver reply");
        }
    }
}
