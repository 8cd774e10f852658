use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::MessageFilterExt;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handlers::{self, Reply};
use crate::identity::BotIdentity;
use crate::qa::QaClient;

/// Shared application state, immutable for the process lifetime.
pub struct AppState {
    pub identity: BotIdentity,
    qa: QaClient,
    config: Config,
}

impl AppState {
    /// Fails fast on a malformed bot token; the bot cannot operate
    /// without its own identity.
    pub fn new(config: Config) -> Result<Self> {
        let identity =
            BotIdentity::from_token(&config.telegram.bot_token, config.telegram.greeting.clone())?;
        let qa = QaClient::new(config.qa.clone());
        Ok(Self {
            identity,
            qa,
            config,
        })
    }
}

/// Start the Telegram bot and block until it is stopped.
///
/// Registers the four event subscriptions and long-polls for updates.
/// The /start branch is ordered before the free-text branch, so a command
/// produces exactly one outbound reply instead of also being forwarded to
/// the QA service.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram bot...");

    let handler = Update::filter_message()
        .branch(Message::filter_new_chat_members().endpoint(handle_new_members))
        .branch(Message::filter_left_chat_member().endpoint(handle_member_left))
        .branch(
            dptree::filter(|msg: Message| {
                msg.text().map(handlers::is_start_command).unwrap_or(false)
            })
            .endpoint(handle_start),
        )
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text));

    let listener = teloxide::update_listeners::polling_default(bot.clone()).await;

    // Handler errors are logged and swallowed here; a failing event never
    // stops the dispatcher or affects later events. Polling errors are
    // logged through the listener error handler and are never fatal.
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("handler error"))
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("polling error"),
        )
        .await;

    Ok(())
}

async fn handle_new_members(
    bot: Bot,
    msg: Message,
    members: Vec<User>,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    info!(
        "{} member(s) joined chat {}",
        members.len(),
        msg.chat.id
    );

    if let Some(reply) = handlers::welcome_reply(&state.identity, &members) {
        send_reply(&bot, msg.chat.id, reply).await?;
    }

    Ok(())
}

async fn handle_member_left(bot: Bot, msg: Message, member: User) -> ResponseResult<()> {
    info!("{} left chat {}", member.first_name, msg.chat.id);

    send_reply(&bot, msg.chat.id, handlers::farewell_reply(&member)).await
}

async fn handle_start(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    info!("Start command in chat {}", msg.chat.id);

    send_reply(&bot, msg.chat.id, handlers::start_reply(&state.identity)).await
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Question in chat {}: {}", msg.chat.id, text);

    match handlers::answer_reply(&state.qa, &text).await {
        Ok(reply) => send_reply(&bot, msg.chat.id, reply).await?,
        Err(e) => {
            // The chat gets no reply on collaborator failure; the error is
            // terminal for this event only.
            error!("Error answering question: {:#}", e);
        }
    }

    Ok(())
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    let mut request = bot.send_message(chat_id, reply.text);
    if reply.markdown {
        request = request.parse_mode(ParseMode::Markdown);
    }
    request.await?;

    Ok(())
}
