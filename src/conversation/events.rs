//! Inbound events the state machine reacts to.

use crate::channels::IncomingMessage;
use crate::persona::RespondentTrait;

/// Main-menu and trait-menu buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    NewRespondent,
    StartInterview,
    ChooseTrait(RespondentTrait),
}

impl MenuAction {
    pub fn callback_data(&self) -> &'static str {
        match self {
            Self::NewRespondent => "new_responder",
            Self::StartInterview => "start_interview",
            Self::ChooseTrait(t) => t.callback_data(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "new_responder" => Some(Self::NewRespondent),
            "start_interview" => Some(Self::StartInterview),
            other => RespondentTrait::from_callback_data(other).map(Self::ChooseTrait),
        }
    }
}

/// What a chat message means to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    /// `/start` or `/restart`.
    Start,
    /// `/menu`: back to the main menu, keeping the current respondent.
    Menu,
    /// `/help`.
    Help,
    /// `/hypothesis`, optionally with the hypothesis inline.
    SetHypothesis(Option<String>),
    UnknownCommand(String),
    Button(MenuAction),
    UnknownButton(String),
    Text(String),
}

impl ConversationEvent {
    pub fn from_message(msg: &IncomingMessage) -> Self {
        if let Some(ref data) = msg.callback_data {
            return match MenuAction::parse(data) {
                Some(action) => Self::Button(action),
                None => Self::UnknownButton(data.clone()),
            };
        }
        Self::from_text(&msg.content)
    }

    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        let Some(command_line) = text.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };

        let (command, rest) = command_line
            .split_once(char::is_whitespace)
            .unwrap_or((command_line, ""));
        // Telegram group chats address commands as /cmd@BotName.
        let command = command.split('@').next().unwrap_or(command);
        let rest = rest.trim();

        match command.to_ascii_lowercase().as_str() {
            "start" | "restart" => Self::Start,
            "menu" => Self::Menu,
            "help" => Self::Help,
            "hypothesis" => {
                Self::SetHypothesis((!rest.is_empty()).then(|| rest.to_string()))
            }
            _ => Self::UnknownCommand(command.to_string()),
        }
    }
}
