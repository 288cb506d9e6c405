//! ConversationManager: drives one chat through respondent creation and
//! the interview, calling the synthesizer and responder as needed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channels::{InlineButton, OutgoingResponse, StatusUpdate};
use crate::error::{DatabaseError, InputError};
use crate::interview::InterviewResponder;
use crate::interview::model::hypothesis_or_default;
use crate::llm::{LlmProvider, RetryPolicy};
use crate::persona::model::{MAX_AGE, MIN_AGE};
use crate::persona::{ProfileSynthesizer, RespondentTrait};
use crate::store::{Database, StoredPersona};

use super::events::{ConversationEvent, MenuAction};
use super::session::{Session, SessionStore};
use super::state::ConversationState;

const WELCOME: &str = "\
👋 Hi! I play customer-development respondents.

Create a respondent, then interview them the way you would interview a real customer.";

const HELP: &str = "\
Commands:
/start, /restart: start over with the main menu
/menu: back to the main menu, keeping the current respondent
/hypothesis: set the hypothesis you are testing in the interview
/help: show this message

Flow: create a respondent (character, profession, age), then type your questions.";

const PROFESSION_PROMPT: &str =
    "Specify the respondent's profession (for example: accountant, barista, product manager):";
const AGE_PROMPT: &str = "Specify age (18 to 80):";
const HYPOTHESIS_PROMPT: &str = "📝 State the hypothesis you want to test in this interview:";
const GENERATING: &str = "🤖 Generating respondent...";
const THINKING: &str = "🤔 Thinking...";
const SESSION_EXPIRED: &str = "❌ Session expired. Please create a new respondent.";
const RESPONDENT_NOT_FOUND: &str = "❌ Respondent not found. Please create a new respondent.";

/// Receives progress notices while a step waits on the language model.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn notify(&self, update: StatusUpdate);
}

/// Discards progress notices.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn notify(&self, _update: StatusUpdate) {}
}

/// Parse and range-check an age typed by the operator.
pub fn parse_age(text: &str) -> Result<u32, InputError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(InputError::Empty);
    }
    let age: i64 = text
        .parse()
        .map_err(|_| InputError::NotANumber(text.to_string()))?;
    if !(i64::from(MIN_AGE)..=i64::from(MAX_AGE)).contains(&age) {
        return Err(InputError::AgeOutOfRange {
            age,
            min: MIN_AGE,
            max: MAX_AGE,
        });
    }
    // In range, so the cast is lossless.
    Ok(age as u32)
}

fn main_menu(text: impl Into<String>) -> OutgoingResponse {
    OutgoingResponse::text(text).with_button_column([
        InlineButton::new("👤 New respondent", MenuAction::NewRespondent.callback_data()),
        InlineButton::new("🎙 Start interview", MenuAction::StartInterview.callback_data()),
    ])
}

fn trait_menu() -> OutgoingResponse {
    OutgoingResponse::text("Choose the respondent's character:").with_button_column(
        RespondentTrait::ALL
            .into_iter()
            .map(|t| InlineButton::new(t.label(), MenuAction::ChooseTrait(t).callback_data())),
    )
}

/// Coordinates per-chat sessions, persona synthesis, interview answers and
/// persistence.
pub struct ConversationManager {
    sessions: Arc<SessionStore>,
    db: Arc<dyn Database>,
    synthesizer: ProfileSynthesizer,
    responder: InterviewResponder,
}

impl ConversationManager {
    pub fn new(
        sessions: Arc<SessionStore>,
        db: Arc<dyn Database>,
        llm: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sessions,
            db,
            synthesizer: ProfileSynthesizer::new(llm.clone(), retry),
            responder: InterviewResponder::new(llm, retry),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Process one event for the session under `session_key`.
    ///
    /// The session is committed only after the step has finished.
    pub async fn handle(
        &self,
        session_key: &str,
        event: ConversationEvent,
        progress: &dyn ProgressSink,
    ) -> Vec<OutgoingResponse> {
        let mut session = self.sessions.get_or_create(session_key).await;
        debug!(session = session_key, state = %session.state, ?event, "Handling event");

        let replies = self.step(&mut session, event, progress).await;

        self.sessions.commit(session).await;
        replies
    }

    async fn step(
        &self,
        session: &mut Session,
        event: ConversationEvent,
        progress: &dyn ProgressSink,
    ) -> Vec<OutgoingResponse> {
        match event {
            ConversationEvent::Start => {
                info!(session = %session.key, "Session reset");
                session.reset();
                vec![main_menu(WELCOME)]
            }
            ConversationEvent::Menu => vec![self.on_menu(session)],
            ConversationEvent::Help => vec![OutgoingResponse::text(HELP)],
            ConversationEvent::UnknownCommand(command) => vec![OutgoingResponse::text(format!(
                "Unknown command /{command}. Type /help to see what I understand."
            ))],
            ConversationEvent::UnknownButton(data) => {
                debug!(session = %session.key, %data, "Ignoring unknown button");
                vec![OutgoingResponse::text("This option is not available.")]
            }
            ConversationEvent::Button(action) => self.on_button(session, action),
            ConversationEvent::SetHypothesis(inline) => self.on_hypothesis_command(session, inline).await,
            ConversationEvent::Text(text) => self.on_text(session, text, progress).await,
        }
    }

    /// Leave the current step for the main menu. The respondent stays active
    /// and the open interview record is closed.
    fn on_menu(&self, session: &mut Session) -> OutgoingResponse {
        session.clear_selections();
        session.interview_id = None;
        session.transition_to(ConversationState::ChoosingRespondent);
        if session.persona_id.is_some() {
            main_menu("Choose an action. Press 🎙 Start interview to continue with the current respondent.")
        } else {
            main_menu("Choose an action:")
        }
    }

    fn on_button(&self, session: &mut Session, action: MenuAction) -> Vec<OutgoingResponse> {
        if session.state != ConversationState::ChoosingRespondent {
            return vec![OutgoingResponse::text(
                "Please finish the current step first, or type /menu to go back.",
            )];
        }

        match action {
            MenuAction::NewRespondent => {
                session.clear_selections();
                vec![trait_menu()]
            }
            MenuAction::ChooseTrait(respondent_trait) => {
                session.respondent_trait = Some(respondent_trait);
                session.transition_to(ConversationState::WaitingProfession);
                vec![OutgoingResponse::text(PROFESSION_PROMPT)]
            }
            MenuAction::StartInterview => {
                if session.persona_id.is_none() {
                    return vec![main_menu("❗️ Create a respondent first.")];
                }
                session.transition_to(ConversationState::HypothesisInput);
                vec![OutgoingResponse::text(HYPOTHESIS_PROMPT)]
            }
        }
    }

    async fn on_hypothesis_command(
        &self,
        session: &mut Session,
        inline: Option<String>,
    ) -> Vec<OutgoingResponse> {
        match session.state {
            ConversationState::WaitingProfession | ConversationState::WaitingAge => {
                return vec![OutgoingResponse::text(
                    "Please finish creating the respondent first, or type /restart to start over.",
                )];
            }
            ConversationState::ChoosingRespondent if session.persona_id.is_none() => {
                return vec![main_menu("❗️ Create a respondent first.")];
            }
            _ => {}
        }

        if let Err(reply) = self.active_persona(session).await {
            return vec![reply];
        }
        if session.state == ConversationState::ChoosingRespondent {
            session.transition_to(ConversationState::HypothesisInput);
        }

        match inline {
            Some(hypothesis) => vec![self.apply_hypothesis(session, hypothesis)],
            None => {
                session.transition_to(ConversationState::HypothesisInput);
                vec![OutgoingResponse::text(HYPOTHESIS_PROMPT)]
            }
        }
    }

    async fn on_text(
        &self,
        session: &mut Session,
        text: String,
        progress: &dyn ProgressSink,
    ) -> Vec<OutgoingResponse> {
        match session.state {
            ConversationState::ChoosingRespondent => vec![main_menu("Choose an action:")],

            ConversationState::WaitingProfession => {
                if text.is_empty() {
                    return vec![OutgoingResponse::text(PROFESSION_PROMPT)];
                }
                session.profession = Some(text);
                session.transition_to(ConversationState::WaitingAge);
                vec![OutgoingResponse::text(AGE_PROMPT)]
            }

            ConversationState::WaitingAge => match parse_age(&text) {
                Ok(age) => {
                    session.age = Some(age);
                    vec![self.create_respondent(session, progress).await]
                }
                Err(e) => {
                    debug!(session = %session.key, error = %e, "Rejected age input");
                    let reply = match e {
                        InputError::NotANumber(_) => format!("❌ Please enter a valid number.\n{AGE_PROMPT}"),
                        InputError::AgeOutOfRange { min, max, .. } => {
                            format!("❌ Age must be between {min} and {max}.\n{AGE_PROMPT}")
                        }
                        InputError::Empty => AGE_PROMPT.to_string(),
                    };
                    vec![OutgoingResponse::text(reply)]
                }
            },

            ConversationState::HypothesisInput => {
                if let Err(reply) = self.active_persona(session).await {
                    return vec![reply];
                }
                if text.is_empty() {
                    return vec![OutgoingResponse::text(HYPOTHESIS_PROMPT)];
                }
                vec![self.apply_hypothesis(session, text)]
            }

            ConversationState::Interview => {
                let persona = match self.active_persona(session).await {
                    Ok(persona) => persona,
                    Err(reply) => return vec![reply],
                };
                if text.is_empty() {
                    return vec![OutgoingResponse::text("Please type a question.")];
                }
                vec![self.answer_question(session, &persona, &text, progress).await]
            }
        }
    }

    /// Synthesize, persist and announce a respondent from the session's selections.
    async fn create_respondent(
        &self,
        session: &mut Session,
        progress: &dyn ProgressSink,
    ) -> OutgoingResponse {
        let (Some(respondent_trait), Some(profession), Some(age)) =
            (session.respondent_trait, session.profession.clone(), session.age)
        else {
            warn!(session = %session.key, "Respondent selections lost; resetting");
            session.reset();
            return main_menu(SESSION_EXPIRED);
        };

        progress.notify(StatusUpdate::Status(GENERATING.to_string())).await;

        let persona = match self
            .synthesizer
            .synthesize(age, &profession, respondent_trait)
            .await
        {
            Ok(persona) => persona,
            Err(e) => {
                error!(session = %session.key, error = %e, "Respondent synthesis failed");
                session.clear_selections();
                session.transition_to(ConversationState::ChoosingRespondent);
                return main_menu(e.user_message());
            }
        };

        let persona_id = match self.db.create_persona(respondent_trait, &persona.profile).await {
            Ok(id) => id,
            Err(e) => {
                error!(session = %session.key, error = %e, "Failed to store respondent");
                session.clear_selections();
                session.transition_to(ConversationState::ChoosingRespondent);
                return main_menu("❌ Could not save the respondent. Please try again.");
            }
        };

        info!(
            session = %session.key,
            persona_id = %persona_id,
            name = %persona.profile.name,
            warnings = persona.warnings.len(),
            "Respondent created"
        );
        session.persona_id = Some(persona_id);
        session.interview_id = None;
        session.hypothesis = None;
        session.clear_selections();
        session.transition_to(ConversationState::Interview);
        OutgoingResponse::text(persona.summary)
    }

    async fn answer_question(
        &self,
        session: &mut Session,
        persona: &StoredPersona,
        question: &str,
        progress: &dyn ProgressSink,
    ) -> OutgoingResponse {
        progress.notify(StatusUpdate::Thinking(THINKING.to_string())).await;

        let answer = match self.responder.respond(question, &persona.profile).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(session = %session.key, error = %e, "Interview answer failed");
                return OutgoingResponse::text(
                    "❌ The respondent could not answer right now. Please try again.",
                );
            }
        };

        if answer.is_empty() {
            return OutgoingResponse::text(
                "🤐 The respondent stayed silent. Try rephrasing the question.",
            );
        }

        if let Err(e) = self.record_turn(session, persona.id, question, &answer).await {
            error!(session = %session.key, error = %e, "Failed to store interview turn");
        }
        OutgoingResponse::text(answer)
    }

    /// Append a turn, opening the interview record on first use.
    async fn record_turn(
        &self,
        session: &mut Session,
        persona_id: Uuid,
        question: &str,
        answer: &str,
    ) -> Result<(), DatabaseError> {
        if let Some(interview_id) = session.interview_id {
            match self.db.append_turn(interview_id, question, answer).await {
                Ok(_) => return Ok(()),
                Err(DatabaseError::NotFound { .. }) => {
                    warn!(session = %session.key, %interview_id, "Interview record vanished; opening a new one");
                }
                Err(e) => return Err(e),
            }
        }

        let hypothesis = hypothesis_or_default(session.hypothesis.as_deref()).to_string();
        let interview_id = self.db.create_interview(persona_id, &hypothesis).await?;
        session.interview_id = Some(interview_id);
        info!(session = %session.key, %interview_id, %hypothesis, "Interview opened");
        self.db.append_turn(interview_id, question, answer).await?;
        Ok(())
    }

    fn apply_hypothesis(&self, session: &mut Session, hypothesis: String) -> OutgoingResponse {
        info!(session = %session.key, %hypothesis, "Hypothesis set");
        let reply = format!("✅ Hypothesis saved: {hypothesis}\n\nAsk your first question:");
        session.hypothesis = Some(hypothesis);
        // The next question opens a fresh interview record.
        session.interview_id = None;
        session.transition_to(ConversationState::Interview);
        OutgoingResponse::text(reply)
    }

    /// Load the session's respondent, resetting the session when it is gone.
    async fn active_persona(&self, session: &mut Session) -> Result<StoredPersona, OutgoingResponse> {
        let Some(persona_id) = session.persona_id else {
            warn!(session = %session.key, state = %session.state, "No active respondent");
            session.reset();
            return Err(main_menu(SESSION_EXPIRED));
        };

        match self.db.get_persona(persona_id).await {
            Ok(Some(persona)) => Ok(persona),
            Ok(None) => {
                warn!(session = %session.key, %persona_id, "Respondent record missing");
                session.reset();
                Err(main_menu(RESPONDENT_NOT_FOUND))
            }
            Err(e) => {
                error!(session = %session.key, error = %e, "Failed to load respondent");
                Err(OutgoingResponse::text(
                    "❌ Could not load the respondent. Please try again.",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, CompletionText};
    use crate::persona::PersonaProfile;
    use crate::store::LibSqlBackend;

    const PROFILE_JSON: &str = r#"```json
{"name": "Oleg Petrov", "age": 35, "profession": "barista",
 "pain_points": ["early shifts", "rude customers"],
 "communication_style": "Short sentences, a bit sarcastic, avoids small talk.",
 "traps": ["jokes instead of answering", "says it depends"]}
```"#;

    /// Replays scripted replies in order.
    struct ScriptedLlm {
        replies: Mutex<Vec<Result<String, u16>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<&str, u16>>) -> Arc<Self> {
            let mut replies: Vec<_> = replies.into_iter().map(|r| r.map(String::from)).collect();
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let next = self.replies.lock().unwrap().pop().expect("script exhausted");
            match next {
                Ok(text) => Ok(CompletionResponse {
                    text: CompletionText::Content(text),
                    model: None,
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(status) => Err(LlmError::Http {
                    provider: "scripted".into(),
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<StatusUpdate>>);

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn notify(&self, update: StatusUpdate) {
            self.0.lock().unwrap().push(update);
        }
    }

    const KEY: &str = "telegram:100";

    async fn manager(replies: Vec<Result<&str, u16>>) -> (ConversationManager, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let manager = ConversationManager::new(
            Arc::new(SessionStore::new()),
            db.clone(),
            ScriptedLlm::new(replies),
            RetryPolicy::none(),
        );
        (manager, db)
    }

    async fn send(m: &ConversationManager, event: ConversationEvent) -> OutgoingResponse {
        let mut replies = m.handle(KEY, event, &NoProgress).await;
        assert_eq!(replies.len(), 1);
        replies.remove(0)
    }

    async fn text(m: &ConversationManager, t: &str) -> OutgoingResponse {
        send(m, ConversationEvent::Text(t.to_string())).await
    }

    async fn state(m: &ConversationManager) -> ConversationState {
        m.sessions().get_or_create(KEY).await.state
    }

    /// Walk to WaitingAge with a skeptic barista.
    async fn to_waiting_age(m: &ConversationManager) {
        send(m, ConversationEvent::Start).await;
        send(m, ConversationEvent::Button(MenuAction::NewRespondent)).await;
        send(m, ConversationEvent::Button(MenuAction::ChooseTrait(RespondentTrait::Skeptic))).await;
        text(m, "barista").await;
        assert_eq!(state(m).await, ConversationState::WaitingAge);
    }

    fn sample_profile() -> PersonaProfile {
        PersonaProfile {
            name: "Oleg".into(),
            age: 35,
            profession: "barista".into(),
            pain_points: vec!["a".into(), "b".into()],
            communication_style: "one two three four five".into(),
            traps: vec!["x".into(), "y".into()],
        }
    }

    #[test]
    fn age_parsing() {
        assert_eq!(parse_age(" 35 "), Ok(35));
        assert_eq!(parse_age("18"), Ok(18));
        assert_eq!(parse_age("80"), Ok(80));
        assert!(matches!(parse_age("17"), Err(InputError::AgeOutOfRange { age: 17, .. })));
        assert!(matches!(parse_age("81"), Err(InputError::AgeOutOfRange { age: 81, .. })));
        assert!(matches!(parse_age("-5"), Err(InputError::AgeOutOfRange { .. })));
        assert_eq!(parse_age("thirty"), Err(InputError::NotANumber("thirty".into())));
        assert_eq!(parse_age("  "), Err(InputError::Empty));
    }

    #[tokio::test]
    async fn start_shows_main_menu() {
        let (m, _) = manager(vec![]).await;
        let reply = send(&m, ConversationEvent::Start).await;
        let data: Vec<&str> = reply.flat_buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec!["new_responder", "start_interview"]);
        assert_eq!(state(&m).await, ConversationState::ChoosingRespondent);
    }

    #[tokio::test]
    async fn trait_menu_lists_both_traits() {
        let (m, _) = manager(vec![]).await;
        let reply = send(&m, ConversationEvent::Button(MenuAction::NewRespondent)).await;
        let data: Vec<&str> = reply.flat_buttons().map(|b| b.data.as_str()).collect();
        assert_eq!(data, vec!["trait_skeptic", "trait_chatty"]);
    }

    #[tokio::test]
    async fn blank_profession_reprompts() {
        let (m, _) = manager(vec![]).await;
        send(&m, ConversationEvent::Button(MenuAction::ChooseTrait(RespondentTrait::Chatty))).await;
        let reply = text(&m, "").await;
        assert_eq!(reply.content, PROFESSION_PROMPT);
        assert_eq!(state(&m).await, ConversationState::WaitingProfession);
    }

    #[tokio::test]
    async fn out_of_range_ages_reprompt_and_35_synthesizes() {
        let (m, db) = manager(vec![Ok(PROFILE_JSON)]).await;
        to_waiting_age(&m).await;

        for bad in ["17", "81"] {
            let reply = text(&m, bad).await;
            assert!(reply.content.contains("between 18 and 80"), "{bad}: {}", reply.content);
            assert_eq!(state(&m).await, ConversationState::WaitingAge);
        }
        let reply = text(&m, "abc").await;
        assert!(reply.content.contains("valid number"));
        assert_eq!(state(&m).await, ConversationState::WaitingAge);

        let progress = RecordingProgress::default();
        let replies = m
            .handle(KEY, ConversationEvent::Text("35".into()), &progress)
            .await;
        assert!(replies[0].content.contains("👤 Oleg Petrov"));
        assert_eq!(
            progress.0.lock().unwrap().as_slice(),
            &[StatusUpdate::Status(GENERATING.to_string())]
        );

        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::Interview);
        assert!(session.profession.is_none());
        let stored = db.get_persona(session.persona_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.respondent_trait, RespondentTrait::Skeptic);
        assert_eq!(stored.profile.profession, "barista");
    }

    #[tokio::test]
    async fn synthesis_failure_returns_to_menu() {
        let (m, _) = manager(vec![Ok("Sorry, I can't produce that. RAW-SECRET")]).await;
        to_waiting_age(&m).await;
        let reply = text(&m, "40").await;
        assert!(!reply.content.contains("RAW-SECRET"));
        assert!(reply.content.starts_with('❌'));
        assert!(!reply.buttons.is_empty());
        assert_eq!(state(&m).await, ConversationState::ChoosingRespondent);
    }

    #[tokio::test]
    async fn upstream_failure_returns_to_menu() {
        let (m, _) = manager(vec![Err(503)]).await;
        to_waiting_age(&m).await;
        let reply = text(&m, "40").await;
        assert!(reply.content.contains("not responding"));
        assert_eq!(state(&m).await, ConversationState::ChoosingRespondent);
    }

    #[tokio::test]
    async fn interview_turn_is_persisted_with_default_hypothesis() {
        let (m, db) = manager(vec![
            Ok(PROFILE_JSON),
            Ok("Well... it depends. {\"trap\": \"says it depends\"}"),
        ])
        .await;
        to_waiting_age(&m).await;
        text(&m, "35").await;

        let progress = RecordingProgress::default();
        let replies = m
            .handle(KEY, ConversationEvent::Text("Do you like mornings?".into()), &progress)
            .await;
        assert_eq!(replies[0].content, "Well... it depends.");
        assert_eq!(
            progress.0.lock().unwrap().as_slice(),
            &[StatusUpdate::Thinking(THINKING.to_string())]
        );

        let session = m.sessions().get_or_create(KEY).await;
        let interview = db.get_interview(session.interview_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(interview.hypothesis, "Not specified");
        let turns = db.list_turns(interview.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].question, "Do you like mornings?");
        assert_eq!(turns[0].answer, "Well... it depends.");
    }

    #[tokio::test]
    async fn empty_answer_is_not_persisted() {
        let (m, db) = manager(vec![Ok(PROFILE_JSON), Ok("```\n{}\n```")]).await;
        to_waiting_age(&m).await;
        text(&m, "35").await;

        let reply = text(&m, "Why?").await;
        assert!(reply.content.contains("stayed silent"));
        let session = m.sessions().get_or_create(KEY).await;
        assert!(session.interview_id.is_none());
        assert!(
            db.list_persona_interviews(session.persona_id.unwrap())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn hypothesis_opens_new_interview_record() {
        let (m, db) = manager(vec![Ok(PROFILE_JSON), Ok("First answer."), Ok("Second answer.")]).await;
        to_waiting_age(&m).await;
        text(&m, "35").await;
        text(&m, "Question one?").await;
        let first = m.sessions().get_or_create(KEY).await.interview_id.unwrap();

        send(&m, ConversationEvent::SetHypothesis(None)).await;
        assert_eq!(state(&m).await, ConversationState::HypothesisInput);
        let reply = text(&m, "Baristas want quieter grinders").await;
        assert!(reply.content.contains("Hypothesis saved"));
        assert_eq!(state(&m).await, ConversationState::Interview);

        text(&m, "Question two?").await;
        let session = m.sessions().get_or_create(KEY).await;
        let second = session.interview_id.unwrap();
        assert_ne!(first, second);

        let interviews = db.list_persona_interviews(session.persona_id.unwrap()).await.unwrap();
        assert_eq!(interviews.len(), 2);
        assert_eq!(interviews[1].hypothesis, "Baristas want quieter grinders");
        assert_eq!(db.list_turns(second).await.unwrap()[0].answer, "Second answer.");
    }

    #[tokio::test]
    async fn start_interview_button_needs_persona() {
        let (m, db) = manager(vec![]).await;
        let reply = send(&m, ConversationEvent::Button(MenuAction::StartInterview)).await;
        assert!(reply.content.contains("Create a respondent first"));
        assert_eq!(state(&m).await, ConversationState::ChoosingRespondent);

        let persona_id = db.create_persona(RespondentTrait::Chatty, &sample_profile()).await.unwrap();
        let mut session = Session::new(KEY);
        session.persona_id = Some(persona_id);
        m.sessions().commit(session).await;

        let reply = send(&m, ConversationEvent::Button(MenuAction::StartInterview)).await;
        assert_eq!(reply.content, HYPOTHESIS_PROMPT);
        assert_eq!(state(&m).await, ConversationState::HypothesisInput);
    }

    #[tokio::test]
    async fn menu_keeps_respondent_for_start_interview() {
        let (m, db) = manager(vec![Ok(PROFILE_JSON), Ok("First answer."), Ok("Second answer.")]).await;
        to_waiting_age(&m).await;
        text(&m, "35").await;
        text(&m, "Question one?").await;
        let before = m.sessions().get_or_create(KEY).await;

        let reply = send(&m, ConversationEvent::Menu).await;
        assert!(reply.content.contains("current respondent"));
        assert_eq!(reply.flat_buttons().count(), 2);
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::ChoosingRespondent);
        assert_eq!(session.persona_id, before.persona_id);
        assert!(session.interview_id.is_none());

        let reply = send(&m, ConversationEvent::Button(MenuAction::StartInterview)).await;
        assert_eq!(reply.content, HYPOTHESIS_PROMPT);
        text(&m, "Grinder noise bothers baristas").await;
        assert_eq!(state(&m).await, ConversationState::Interview);

        let reply = text(&m, "Question two?").await;
        assert_eq!(reply.content, "Second answer.");
        let interviews = db
            .list_persona_interviews(before.persona_id.unwrap())
            .await
            .unwrap();
        assert_eq!(interviews.len(), 2);
        assert_eq!(interviews[1].hypothesis, "Grinder noise bothers baristas");
    }

    #[tokio::test]
    async fn menu_without_respondent_still_needs_one() {
        let (m, _) = manager(vec![]).await;
        to_waiting_age(&m).await;
        let reply = send(&m, ConversationEvent::Menu).await;
        assert_eq!(reply.content, "Choose an action:");
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::ChoosingRespondent);
        assert!(session.profession.is_none());

        let reply = send(&m, ConversationEvent::Button(MenuAction::StartInterview)).await;
        assert!(reply.content.contains("Create a respondent first"));
    }

    #[tokio::test]
    async fn inline_hypothesis_from_menu_enters_interview() {
        let (m, _) = manager(vec![Ok(PROFILE_JSON)]).await;
        to_waiting_age(&m).await;
        text(&m, "35").await;
        send(&m, ConversationEvent::Menu).await;

        let reply = send(&m, ConversationEvent::SetHypothesis(Some("Tips matter".into()))).await;
        assert!(reply.content.contains("Tips matter"));
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::Interview);
        assert_eq!(session.hypothesis.as_deref(), Some("Tips matter"));
    }

    #[tokio::test]
    async fn missing_persona_id_expires_session() {
        let (m, _) = manager(vec![]).await;
        let mut session = Session::new(KEY);
        session.state = ConversationState::Interview;
        m.sessions().commit(session).await;

        let reply = text(&m, "Hello?").await;
        assert_eq!(reply.content, SESSION_EXPIRED);
        assert_eq!(state(&m).await, ConversationState::ChoosingRespondent);
    }

    #[tokio::test]
    async fn missing_persona_record_reports_not_found() {
        let (m, _) = manager(vec![]).await;
        let mut session = Session::new(KEY);
        session.state = ConversationState::HypothesisInput;
        session.persona_id = Some(Uuid::new_v4());
        m.sessions().commit(session).await;

        let reply = text(&m, "Some hypothesis").await;
        assert_eq!(reply.content, RESPONDENT_NOT_FOUND);
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::ChoosingRespondent);
        assert!(session.persona_id.is_none());
    }

    #[tokio::test]
    async fn buttons_outside_menu_keep_state() {
        let (m, _) = manager(vec![]).await;
        to_waiting_age(&m).await;
        let reply = send(&m, ConversationEvent::Button(MenuAction::NewRespondent)).await;
        assert!(reply.content.contains("finish the current step"));
        assert_eq!(state(&m).await, ConversationState::WaitingAge);
    }

    #[tokio::test]
    async fn help_keeps_state_and_restart_resets() {
        let (m, _) = manager(vec![]).await;
        to_waiting_age(&m).await;
        let reply = send(&m, ConversationEvent::Help).await;
        assert!(reply.content.contains("/hypothesis"));
        assert_eq!(state(&m).await, ConversationState::WaitingAge);

        send(&m, ConversationEvent::Start).await;
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::ChoosingRespondent);
        assert!(session.profession.is_none());
    }

    #[tokio::test]
    async fn inline_hypothesis_applies_directly() {
        let (m, db) = manager(vec![]).await;
        let persona_id = db.create_persona(RespondentTrait::Skeptic, &sample_profile()).await.unwrap();
        let mut session = Session::new(KEY);
        session.state = ConversationState::Interview;
        session.persona_id = Some(persona_id);
        m.sessions().commit(session).await;

        let reply = send(&m, ConversationEvent::SetHypothesis(Some("Tips matter".into()))).await;
        assert!(reply.content.contains("Tips matter"));
        let session = m.sessions().get_or_create(KEY).await;
        assert_eq!(session.state, ConversationState::Interview);
        assert_eq!(session.hypothesis.as_deref(), Some("Tips matter"));
    }
}
