//! Response orchestration: the per-event policy driving engagement,
//! context assembly, the completion call, directive execution, and history
//! commits.
//!
//! Every failure path ends in a short in-character reply; the user never
//! sees silence or a raw error, and no single event can take the process
//! down.

use crate::actions::ActionLog;
use crate::conversation::{self, HistoryStore};
use crate::directive::{self, Directive};
use crate::engagement::{self, Engagement};
use crate::llm::CompletionService;
use crate::roster::RosterSnapshot;
use crate::{ConversationKey, Turn};

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

/// Replies longer than this are cut and marked with an ellipsis, leaving
/// room under Discord's 2000-character message ceiling.
pub const TRUNCATE_AT: usize = 1900;

const REPLY_EMPTY_PROMPT: &str = "Hi! Ask me anything.";
const REPLY_NOT_CONFIGURED: &str =
    "I'm missing my completion API key, so I can't think right now. \
     Ask whoever runs me to set OPENROUTER_API_KEY.";
const REPLY_MODEL_FAILED: &str =
    "Something went sideways while I was thinking. Give it another try in a moment.";
const REPLY_CONFUSED: &str = "I got a bit tangled up there. Could you ask that again?";

static MENTION_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?\d+>").expect("hardcoded regex"));

/// Capability to deliver a direct message to a member, supplied by the
/// messaging gateway. Errors carry a human-readable detail for the action
/// log.
#[async_trait]
pub trait DirectMessenger: Send + Sync {
    async fn send_direct(
        &self,
        recipient: &crate::roster::Identity,
        text: &str,
    ) -> Result<(), String>;
}

/// Per-guild designated-channel table. Injected state, not a process-wide
/// singleton, so tests can run isolated instances.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: Mutex<HashMap<u64, u64>>,
}

impl ChannelDirectory {
    pub fn designate(&self, guild_id: u64, channel_id: u64) {
        self.channels
            .lock()
            .expect("channel directory lock poisoned")
            .insert(guild_id, channel_id);
    }

    pub fn clear(&self, guild_id: u64) {
        self.channels
            .lock()
            .expect("channel directory lock poisoned")
            .remove(&guild_id);
    }

    pub fn is_dedicated(&self, guild_id: u64, channel_id: u64) -> bool {
        self.channels
            .lock()
            .expect("channel directory lock poisoned")
            .get(&guild_id)
            .is_some_and(|designated| *designated == channel_id)
    }
}

/// One inbound plain message, lifted out of the gateway's types.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub key: ConversationKey,
    /// `None` for private conversations.
    pub guild_id: Option<u64>,
    pub text: String,
    pub mentions_bot: bool,
}

impl MessageEvent {
    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }
}

/// Everything one engaged turn needs from the triggering event.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub key: ConversationKey,
    pub question: String,
    /// Display name of the triggering human, for speaker attribution.
    pub speaker: String,
    /// Platform user id of the triggering human, for resolving "me".
    pub speaker_id: u64,
    pub is_private: bool,
}

/// Top-level per-event policy. Owns the injected state containers and the
/// completion-service handle; the gateway hands in the live roster and a
/// send capability per call.
pub struct Orchestrator {
    bot_name: String,
    history: HistoryStore,
    actions: ActionLog,
    channels: ChannelDirectory,
    completion: Arc<dyn CompletionService>,
}

impl Orchestrator {
    pub fn new(bot_name: &str, max_turns: usize, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            bot_name: bot_name.to_string(),
            history: HistoryStore::new(bot_name, max_turns),
            actions: ActionLog::new(),
            channels: ChannelDirectory::default(),
            completion,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn actions(&self) -> &ActionLog {
        &self.actions
    }

    pub fn channels(&self) -> &ChannelDirectory {
        &self.channels
    }

    /// Record a message the bot is not responding to, so later engaged
    /// turns see the surrounding multi-party conversation.
    pub fn observe(&self, key: ConversationKey, is_private: bool, speaker: &str, text: &str) {
        self.history.ensure(key, is_private);
        self.history
            .append(key, Turn::user(text, Some(speaker.to_string())));
    }

    /// Engagement decision for a plain message. Explicit command
    /// invocations always engage and skip this entirely.
    pub fn should_engage(&self, event: &MessageEvent) -> Option<Engagement> {
        let is_dedicated = event
            .guild_id
            .is_some_and(|guild_id| self.channels.is_dedicated(guild_id, event.key.0));

        engagement::should_engage(
            &event.text,
            event.is_private(),
            event.mentions_bot,
            is_dedicated,
            &self.bot_name,
        )
    }

    /// Run one engaged turn end to end and produce the user-visible reply,
    /// already truncated for the platform. Never errors out of an event.
    pub async fn respond(
        &self,
        request: TurnRequest,
        roster: Option<&RosterSnapshot>,
        messenger: &dyn DirectMessenger,
    ) -> String {
        let question = strip_mentions(&request.question);
        if question.is_empty() {
            return REPLY_EMPTY_PROMPT.to_string();
        }

        if !self.completion.is_configured() {
            return REPLY_NOT_CONFIGURED.to_string();
        }

        self.history.ensure(request.key, request.is_private);
        self.history.append(
            request.key,
            Turn::user(question.clone(), Some(request.speaker.clone())),
        );

        let turns = conversation::assemble(
            &self.history,
            &self.actions,
            request.key,
            request.is_private,
            roster,
        );

        let raw = match self.completion.complete(&turns).await {
            Ok(raw) => raw,
            Err(error) => {
                // the user turn stays committed; no assistant turn is added
                tracing::warn!(%error, key = %request.key, "completion call failed");
                return REPLY_MODEL_FAILED.to_string();
            }
        };

        let (found, mut reply) = directive::extract(&raw);

        if let Some(found) = found {
            if request.is_private {
                // a private conversation's content must never be routed to
                // a third party
                tracing::info!(
                    recipient = %found.target,
                    "ignoring DM directive emitted in a private conversation"
                );
            } else if let Some(roster) = roster {
                let delivered = self
                    .execute_directive(&found, roster, &request, messenger)
                    .await;

                if !delivered {
                    let note = format!("⚠️ I couldn't deliver that DM to {}.", found.target);
                    if reply.is_empty() {
                        reply = note;
                    } else {
                        reply.push_str("\n\n");
                        reply.push_str(&note);
                    }
                } else if reply.is_empty() {
                    reply = format!("📩 Sent that DM to {}.", found.target);
                }
            }
        }

        if reply.trim().is_empty() {
            return REPLY_CONFUSED.to_string();
        }

        self.history.append(request.key, Turn::assistant(reply.clone()));

        truncate_reply(&reply)
    }

    /// Resolve the directive target and attempt the send. Records the
    /// outcome in the action log and appends a system turn documenting it
    /// with the literal target name and payload. Returns whether delivery
    /// succeeded.
    async fn execute_directive(
        &self,
        found: &Directive,
        roster: &RosterSnapshot,
        request: &TurnRequest,
        messenger: &dyn DirectMessenger,
    ) -> bool {
        // "me" is resolved here, against the triggering user; the resolver
        // has no notion of a current speaker
        let recipient = if found.target.eq_ignore_ascii_case("me") {
            roster.by_user_id(request.speaker_id)
        } else {
            roster.find(&found.target)
        };

        match recipient {
            Some(member) => match messenger.send_direct(member, &found.message).await {
                Ok(()) => {
                    self.actions.record_success(&member.handle, &found.message);
                    self.history.append(
                        request.key,
                        Turn::system(format!(
                            "[DM delivered: \"{}\" sent to {}]",
                            found.message, found.target
                        )),
                    );
                    true
                }
                Err(detail) => {
                    tracing::warn!(recipient = %found.target, %detail, "direct message send failed");
                    self.actions
                        .record_failure(&member.handle, &found.message, &detail);
                    self.history.append(
                        request.key,
                        Turn::system(format!(
                            "[DM failed: could not send \"{}\" to {} ({detail})]",
                            found.message, found.target
                        )),
                    );
                    false
                }
            },
            None => {
                let detail = format!("no member matching \"{}\"", found.target);
                tracing::info!(recipient = %found.target, "directive target not found in roster");
                self.actions
                    .record_failure(&found.target, &found.message, &detail);
                self.history.append(
                    request.key,
                    Turn::system(format!(
                        "[DM failed: could not send \"{}\" to {} (user not found)]",
                        found.message, found.target
                    )),
                );
                false
            }
        }
    }
}

/// Strip explicit bot-mention markup and surrounding whitespace, leaving
/// the effective question.
pub fn strip_mentions(text: &str) -> String {
    MENTION_MARKUP.replace_all(text, "").trim().to_string()
}

/// Cut a reply to fit under the platform ceiling, marking the cut with an
/// ellipsis.
pub fn truncate_reply(text: &str) -> String {
    if text.chars().count() <= TRUNCATE_AT {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(TRUNCATE_AT).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::roster::Identity;
    use crate::Role;
    use std::collections::VecDeque;

    const KEY: ConversationKey = ConversationKey(42);

    /// Scripted completion service: pops one canned result per call.
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<String, CompletionError>>>,
        configured: bool,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::from([Ok(text.to_string())])),
                configured: true,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::from([Err(CompletionError::EmptyResponse)])),
                configured: true,
            })
        }

        fn unconfigured() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                configured: false,
            })
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedModel {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, _turns: &[Turn]) -> Result<String, CompletionError> {
            self.script
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }
    }

    /// Records sends; refuses recipients listed in `rejects`.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(String, String)>>,
        rejects: Vec<String>,
    }

    #[async_trait]
    impl DirectMessenger for RecordingMessenger {
        async fn send_direct(&self, recipient: &Identity, text: &str) -> Result<(), String> {
            if self.rejects.contains(&recipient.handle) {
                return Err("DMs disabled".to_string());
            }
            self.sent
                .lock()
                .expect("sent lock")
                .push((recipient.handle.clone(), text.to_string()));
            Ok(())
        }
    }

    fn roster() -> RosterSnapshot {
        RosterSnapshot::new(vec![
            Identity {
                user_id: 1,
                handle: "alice".to_string(),
                display_name: "Alice".to_string(),
                nickname: None,
                aliases: vec!["Wonder".to_string()],
            },
            Identity {
                user_id: 2,
                handle: "bob_42".to_string(),
                display_name: "Bobby".to_string(),
                nickname: None,
                aliases: vec![],
            },
        ])
    }

    fn request(question: &str) -> TurnRequest {
        TurnRequest {
            key: KEY,
            question: question.to_string(),
            speaker: "Alice".to_string(),
            speaker_id: 1,
            is_private: false,
        }
    }

    #[tokio::test]
    async fn test_plain_reply_commits_both_turns() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::replying("42."));
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("what is the answer?"), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, "42.");
        let turns = orchestrator.history().snapshot(KEY);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].speaker.as_deref(), Some("Alice"));
        assert_eq!(turns[2].role, Role::Assistant);
        assert_eq!(turns[2].content, "42.");
    }

    #[tokio::test]
    async fn test_me_directive_resolves_to_triggering_user() {
        let orchestrator = Orchestrator::new(
            "Guildbot",
            20,
            ScriptedModel::replying("Sure! [DM:me:secret code 42] I'll send that now."),
        );
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("dm me the code"), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, "Sure! I'll send that now.");

        let sent = messenger.sent.lock().expect("sent lock");
        assert_eq!(
            *sent,
            vec![("alice".to_string(), "secret code 42".to_string())]
        );

        let recent = orchestrator.actions().recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].recipient, "alice");
        assert_eq!(
            recent[0].outcome,
            crate::actions::ActionOutcome::Success
        );

        // a system turn documents the delivery for future context
        let turns = orchestrator.history().snapshot(KEY);
        assert!(turns
            .iter()
            .any(|turn| turn.role == Role::System && turn.content.contains("DM delivered")));
    }

    #[tokio::test]
    async fn test_directive_ignored_in_private_conversation() {
        let orchestrator = Orchestrator::new(
            "Guildbot",
            20,
            ScriptedModel::replying("[DM:bob_42:psst] On it."),
        );
        let messenger = RecordingMessenger::default();

        let mut private = request("forward this to bob");
        private.is_private = true;

        let reply = orchestrator.respond(private, None, &messenger).await;

        assert_eq!(reply, "On it.");
        assert!(messenger.sent.lock().expect("sent lock").is_empty());
        assert!(orchestrator.actions().is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_target_surfaces_failure() {
        let orchestrator = Orchestrator::new(
            "Guildbot",
            20,
            ScriptedModel::replying("[DM:nonexistent:hello] Done!"),
        );
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("dm nonexistent"), Some(&roster()), &messenger)
            .await;

        assert!(reply.starts_with("Done!"));
        assert!(reply.contains("couldn't deliver"));

        let recent = orchestrator.actions().recent();
        assert_eq!(recent[0].outcome, crate::actions::ActionOutcome::Failure);
        assert_eq!(recent[0].recipient, "nonexistent");
    }

    #[tokio::test]
    async fn test_rejected_send_synthesizes_status_when_reply_empty() {
        let orchestrator =
            Orchestrator::new("Guildbot", 20, ScriptedModel::replying("[DM:Bobby:hey]"));
        let messenger = RecordingMessenger {
            sent: Mutex::new(Vec::new()),
            rejects: vec!["bob_42".to_string()],
        };

        let reply = orchestrator
            .respond(request("dm bobby for me"), Some(&roster()), &messenger)
            .await;

        assert!(reply.contains("couldn't deliver"));
        let recent = orchestrator.actions().recent();
        assert_eq!(recent[0].outcome, crate::actions::ActionOutcome::Failure);
        assert_eq!(recent[0].error_detail.as_deref(), Some("DMs disabled"));
    }

    #[tokio::test]
    async fn test_delivered_directive_with_empty_text_gets_status_line() {
        let orchestrator =
            Orchestrator::new("Guildbot", 20, ScriptedModel::replying("[DM:alice:hi]"));
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("dm alice hi"), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, "📩 Sent that DM to alice.");
    }

    #[tokio::test]
    async fn test_model_failure_keeps_user_turn_only() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::failing());
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("hello?"), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, REPLY_MODEL_FAILED);
        let turns = orchestrator.history().snapshot(KEY);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::User);
    }

    #[tokio::test]
    async fn test_unconfigured_model_short_circuits_before_history() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::unconfigured());
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("hello?"), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, REPLY_NOT_CONFIGURED);
        assert!(orchestrator.history().snapshot(KEY).is_empty());
    }

    #[tokio::test]
    async fn test_mention_only_message_prompts_for_input() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::replying("unused"));
        let messenger = RecordingMessenger::default();

        let reply = orchestrator
            .respond(request("<@123456789>  "), Some(&roster()), &messenger)
            .await;

        assert_eq!(reply, REPLY_EMPTY_PROMPT);
        assert!(orchestrator.history().snapshot(KEY).is_empty());
    }

    #[test]
    fn test_should_engage_routes_through_channel_directory() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::replying("unused"));
        let event = MessageEvent {
            key: KEY,
            guild_id: Some(7),
            text: "what do you think about rust?".to_string(),
            mentions_bot: false,
        };

        assert!(orchestrator.should_engage(&event).is_none());

        orchestrator.channels().designate(7, KEY.0);
        assert_eq!(
            orchestrator.should_engage(&event),
            Some(Engagement::DirectedAtBot("question-opener"))
        );

        orchestrator.channels().clear(7);
        assert!(orchestrator.should_engage(&event).is_none());
    }

    #[test]
    fn test_observe_records_attributed_user_turn() {
        let orchestrator = Orchestrator::new("Guildbot", 20, ScriptedModel::replying("unused"));
        orchestrator.observe(KEY, false, "Bobby", "just passing through");

        let turns = orchestrator.history().snapshot(KEY);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].speaker.as_deref(), Some("Bobby"));
        assert_eq!(turns[1].content, "just passing through");
    }

    #[test]
    fn test_truncation_stays_under_platform_ceiling() {
        let long = "a".repeat(2500);
        let cut = truncate_reply(&long);
        assert_eq!(cut.chars().count(), TRUNCATE_AT + 3);
        assert!(cut.chars().count() <= 2000);
        assert!(cut.starts_with(&"a".repeat(TRUNCATE_AT)));
        assert!(cut.ends_with("..."));

        let short = "fits fine";
        assert_eq!(truncate_reply(short), short);
    }

    #[test]
    fn test_strip_mentions_removes_ping_markup() {
        assert_eq!(strip_mentions("<@123> hello <@!456> there"), "hello  there");
        assert_eq!(strip_mentions("plain"), "plain");
    }
}
