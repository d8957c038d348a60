//! Conversational refinement: multi-turn chat over the current bullet set.
//!
//! `refine_conversational` is the stateless single turn. `RefinementSession` wraps it
//! with the history bookkeeping: a turn that fails leaves the history exactly as it was.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{ChatMessage, CompletionRequest, CompletionService};
use crate::refinement::prompts::{
    build_chat_system_message, REFINEMENT_MAX_TOKENS, REFINEMENT_TEMPERATURE,
};
use crate::refinement::tagged::{marker_lines, parse_tagged};

/// Used when the model omits the `<RESPONSE>` region.
pub const DEFAULT_EXPLANATION: &str = "I've updated the resume bullets based on your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        match turn.role {
            TurnRole::User => ChatMessage::user(turn.content.clone()),
            TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
        }
    }
}

/// Bullets (verbatim from the model) plus a short explanation of what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementResult {
    pub bullets: String,
    pub explanation: String,
}

/// Resolves a raw chat response into a result.
/// Bullets: tagged region, else marker lines; `None` if neither exists.
pub fn interpret_response(response: &str) -> Option<RefinementResult> {
    let tagged = parse_tagged(response);

    let bullets = match tagged.bullets {
        Some(region) => region.to_string(),
        None => marker_lines(response)?,
    };

    let explanation = tagged
        .explanation
        .unwrap_or(DEFAULT_EXPLANATION)
        .to_string();

    Some(RefinementResult {
        bullets,
        explanation,
    })
}

/// One conversational turn. `history` must already end with the new user message.
pub async fn refine_conversational(
    llm: &dyn CompletionService,
    job_description: &str,
    bullets: &str,
    history: &[ChatTurn],
    model: &str,
) -> Result<RefinementResult, AppError> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::system(build_chat_system_message(
        job_description,
        bullets,
    )));
    messages.extend(history.iter().map(ChatMessage::from));

    let request = CompletionRequest::new(
        model,
        messages,
        REFINEMENT_TEMPERATURE,
        REFINEMENT_MAX_TOKENS,
    );
    let response = llm.complete(request).await?;

    interpret_response(&response).ok_or_else(|| {
        AppError::EmptyCompletion("The model response contained no bullet points".to_string())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No bullets generated yet.
    Idle,
    Ready,
    /// A user turn is appended and its completion is in flight.
    AwaitingResponse,
}

/// Client-scoped chat state. Never shared between sessions, never persisted.
#[derive(Debug, Clone)]
pub struct RefinementSession {
    job_description: String,
    model: String,
    bullets: Option<String>,
    history: Vec<ChatTurn>,
    state: SessionState,
}

impl RefinementSession {
    pub fn new(job_description: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            job_description: job_description.into(),
            model: model.into(),
            bullets: None,
            history: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// Rebuilds a session from client-held state: bullets and the completed turns so far.
    pub fn restore(
        job_description: impl Into<String>,
        model: impl Into<String>,
        bullets: impl Into<String>,
        history: Vec<ChatTurn>,
    ) -> Self {
        let mut session = Self::new(job_description, model);
        session.set_bullets(bullets);
        session.history = history;
        session
    }

    /// Replaces the working bullet set wholesale, e.g. after the first generation.
    pub fn set_bullets(&mut self, bullets: impl Into<String>) {
        let bullets = bullets.into();
        if bullets.trim().is_empty() {
            return;
        }
        self.bullets = Some(bullets);
        if self.state == SessionState::Idle {
            self.state = SessionState::Ready;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bullets(&self) -> Option<&str> {
        self.bullets.as_deref()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn into_history(self) -> Vec<ChatTurn> {
        self.history
    }

    /// Sends one user message. On success the bullets are replaced and the assistant's
    /// explanation is appended; on failure the user turn is removed again.
    pub async fn send(
        &mut self,
        llm: &dyn CompletionService,
        message: &str,
    ) -> Result<RefinementResult, AppError> {
        if self.state == SessionState::AwaitingResponse {
            // previous send was dropped mid-flight
            self.rollback_pending_turn();
        }

        let Some(bullets) = self.bullets.clone() else {
            return Err(AppError::MissingInput(
                "Generate bullets before refining them in chat".to_string(),
            ));
        };
        if message.trim().is_empty() {
            return Err(AppError::MissingInput("Message is required".to_string()));
        }

        self.history.push(ChatTurn::user(message));
        self.state = SessionState::AwaitingResponse;
        info!(
            "Chat refinement turn {} with model {}",
            self.history.len(),
            self.model
        );

        let outcome = refine_conversational(
            llm,
            &self.job_description,
            &bullets,
            &self.history,
            &self.model,
        )
        .await;

        match outcome {
            Ok(result) => {
                self.history
                    .push(ChatTurn::assistant(result.explanation.clone()));
                self.bullets = Some(result.bullets.clone());
                self.state = SessionState::Ready;
                Ok(result)
            }
            Err(e) => {
                warn!("Chat refinement turn failed, rolling back: {e}");
                self.rollback_pending_turn();
                Err(e)
            }
        }
    }

    fn rollback_pending_turn(&mut self) {
        if matches!(self.history.last(), Some(turn) if turn.role == TurnRole::User) {
            self.history.pop();
        }
        self.state = if self.bullets.is_some() {
            SessionState::Ready
        } else {
            SessionState::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Scripted, ScriptedCompletion};
    use crate::llm_client::Role;

    const JD: &str = "Enterprise account executive, SaaS";
    const BULLETS: &str = "- Managed accounts\n- Ran demos";

    fn ready_session() -> RefinementSession {
        let mut session = RefinementSession::new(JD, "gemini-2.5-pro");
        session.set_bullets(BULLETS);
        session
    }

    #[test]
    fn test_interpret_tagged_response() {
        let result = interpret_response(
            "<BULLETS>\n- Grew ARR 40%\n</BULLETS>\n<RESPONSE>\nAdded a metric.\n</RESPONSE>",
        )
        .unwrap();
        assert_eq!(result.bullets, "- Grew ARR 40%");
        assert_eq!(result.explanation, "Added a metric.");
    }

    #[test]
    fn test_interpret_untagged_falls_back_to_marker_lines() {
        let result =
            interpret_response("Here is the update:\n- Closed $3M in new business\n- Led 40 demos\nCheers")
                .unwrap();
        assert_eq!(result.bullets, "- Closed $3M in new business\n- Led 40 demos");
        assert_eq!(result.explanation, DEFAULT_EXPLANATION);
    }

    #[test]
    fn test_interpret_without_any_bullets_is_none() {
        assert!(interpret_response("<RESPONSE>I could not do that</RESPONSE>").is_none());
    }

    #[test]
    fn test_new_session_is_idle_until_bullets_arrive() {
        let mut session = RefinementSession::new(JD, "m");
        assert_eq!(session.state(), SessionState::Idle);
        session.set_bullets("   ");
        assert_eq!(session.state(), SessionState::Idle);
        session.set_bullets(BULLETS);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.bullets(), Some(BULLETS));
    }

    #[tokio::test]
    async fn test_successful_turn_appends_pair_and_replaces_bullets() {
        let llm = ScriptedCompletion::text(
            "<BULLETS>\n- Managed 30 enterprise accounts\n- Ran 50 demos\n</BULLETS>\n<RESPONSE>Quantified both.</RESPONSE>",
        );
        let mut session = ready_session();

        let result = session.send(&llm, "Add numbers").await.unwrap();

        assert_eq!(result.explanation, "Quantified both.");
        assert_eq!(
            session.bullets(),
            Some("- Managed 30 enterprise accounts\n- Ran 50 demos")
        );
        assert_eq!(
            session.history(),
            &[
                ChatTurn::user("Add numbers"),
                ChatTurn::assistant("Quantified both.")
            ]
        );
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_request_carries_system_context_and_full_history() {
        let llm = ScriptedCompletion::new(vec![
            Scripted::Text("<BULLETS>- v1</BULLETS>".to_string()),
            Scripted::Text("<BULLETS>- v2</BULLETS>".to_string()),
        ]);
        let mut session = ready_session();
        session.send(&llm, "first").await.unwrap();
        session.send(&llm, "second").await.unwrap();

        let requests = llm.requests();
        let second = &requests[1];
        assert_eq!(second.model, "gemini-2.5-pro");
        assert!(!second.stream);
        assert_eq!(second.messages[0].role, Role::System);
        assert!(second.messages[0].content.contains(JD));
        // second turn is grounded in the bullets produced by the first
        assert!(second.messages[0].content.contains("- v1"));
        let roles: Vec<Role> = second.messages[1..].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(second.messages[3].content, "second");
    }

    #[tokio::test]
    async fn test_upstream_failure_rolls_back_history() {
        let llm = ScriptedCompletion::new(vec![
            Scripted::Text("<BULLETS>- kept</BULLETS>".to_string()),
            Scripted::Fail("service unavailable".to_string()),
        ]);
        let mut session = ready_session();
        session.send(&llm, "first").await.unwrap();
        let before = session.history().len();

        let err = session.send(&llm, "second").await.unwrap_err();

        assert!(matches!(err, AppError::Upstream(ref msg) if msg.contains("service unavailable")));
        assert_eq!(session.history().len(), before);
        assert_eq!(session.bullets(), Some("- kept"));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_empty_completion_rolls_back() {
        let llm = ScriptedCompletion::new(vec![Scripted::Empty]);
        let mut session = ready_session();

        let err = session.send(&llm, "anything").await.unwrap_err();

        assert!(matches!(err, AppError::EmptyCompletion(_)));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_response_without_bullets_rolls_back() {
        let llm = ScriptedCompletion::text("<RESPONSE>Happy to help!</RESPONSE>");
        let mut session = ready_session();

        let err = session.send(&llm, "make it pop").await.unwrap_err();

        assert!(matches!(err, AppError::EmptyCompletion(_)));
        assert!(session.history().is_empty());
        assert_eq!(session.bullets(), Some(BULLETS));
    }

    #[tokio::test]
    async fn test_send_without_bullets_is_rejected_and_stays_idle() {
        let llm = ScriptedCompletion::text("<BULLETS>- x</BULLETS>");
        let mut session = RefinementSession::new(JD, "m");

        let err = session.send(&llm, "hello").await.unwrap_err();

        assert!(matches!(err, AppError::MissingInput(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.history().is_empty());
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_untagged_reply_with_two_marker_lines() {
        let llm = ScriptedCompletion::text(
            "Sure, here you go\n- Exceeded quota by 130%\n- Built partner channel\nAnything else?",
        );
        let mut session = ready_session();

        let result = session.send(&llm, "more sales").await.unwrap();

        assert_eq!(
            result.bullets,
            "- Exceeded quota by 130%\n- Built partner channel"
        );
        assert_eq!(result.explanation, DEFAULT_EXPLANATION);
    }

    #[tokio::test]
    async fn test_restored_session_continues_from_client_history() {
        let llm = ScriptedCompletion::text("<BULLETS>- next</BULLETS><RESPONSE>done</RESPONSE>");
        let prior = vec![ChatTurn::user("one"), ChatTurn::assistant("ok")];
        let mut session = RefinementSession::restore(JD, "m", BULLETS, prior);

        session.send(&llm, "two").await.unwrap();

        assert_eq!(session.history().len(), 4);
        assert_eq!(llm.requests()[0].messages.len(), 4);
    }

    #[test]
    fn test_chat_turn_wire_format() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "hi"}"#).unwrap();
        assert_eq!(turn, ChatTurn::assistant("hi"));
        assert!(serde_json::from_str::<ChatTurn>(r#"{"role": "system", "content": "x"}"#).is_err());
    }
}
