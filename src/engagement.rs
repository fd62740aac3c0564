//! Data-driven engagement heuristics for plain messages.
//!
//! Two independent rule sets: one judging whether a shared-channel message
//! reads as directed at the bot, one judging whether it asks for a direct
//! message to be sent. Directed-at-bot does not imply DM intent and vice
//! versa; both sets are always evaluated where they apply.

use regex::Regex;
use std::sync::LazyLock;

/// One predicate rule: a tag naming the lexical cue plus its pattern.
/// Rules are plain data so the sets stay inspectable and testable apart
/// from the orchestrator.
#[derive(Debug)]
pub struct Rule {
    pub tag: &'static str,
    pattern: Regex,
}

impl Rule {
    fn new(tag: &'static str, pattern: &str) -> Self {
        Self {
            tag,
            pattern: Regex::new(pattern).expect("hardcoded regex"),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Cues that a shared-channel message is addressed to the bot. Evaluated
/// against the lowercased text.
pub static DIRECTED_AT_BOT: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "question-opener",
            r"^(what|how|when|where|why|who|can you|could you|do you|are you|will you|you)\b",
        ),
        Rule::new("question-mark", r"\?\s*$"),
        Rule::new("imperative-opener", r"^(tell me|explain|help|answer)\b"),
        Rule::new("greeting-opener", r"^(hey|hi|hello|yo|sup)\b"),
        Rule::new("thanks-opener", r"^(thanks|thank you|thx)\b"),
        Rule::new("praise-opener", r"^(good|nice|cool|awesome|great)\b"),
        Rule::new("outburst-opener", r"^(wtf|what the|omg|lol|lmao)\b"),
        Rule::new(
            "first-person-opener",
            r"^(i think|i feel|i want|i need|i have)\b",
        ),
        Rule::new(
            "opinion-request",
            r"(what do you think|your opinion|do you agree)",
        ),
    ]
});

/// Cues that the author wants a direct message sent.
pub static WANTS_DIRECT_MESSAGE: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new("dm-me", r"\b(dm me|send me|message me)\b"),
        Rule::new("send-dm", r"\bsend (a )?(dm|direct message)\b"),
    ]
});

/// Why the bot engaged with a plain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    /// Private surfaces always engage.
    Private,
    /// Explicit ping of the bot user.
    Mention,
    /// The bot's name appeared in the text.
    BotName,
    /// A directed-at-bot rule matched; carries the rule tag.
    DirectedAtBot(&'static str),
    /// A wants-DM rule matched; carries the rule tag.
    WantsDirectMessage(&'static str),
}

fn first_match(rules: &[Rule], text: &str) -> Option<&'static str> {
    rules.iter().find(|rule| rule.matches(text)).map(|r| r.tag)
}

/// Decide whether a plain message warrants a model turn. Explicit command
/// invocations always engage and never pass through here.
///
/// Private surfaces always engage. The designated channel gets the loose
/// directed-at-bot heuristics; everywhere else only an explicit mention
/// (ping or name) or an explicit DM request engages the bot.
pub fn should_engage(
    text: &str,
    is_private: bool,
    mentions_bot: bool,
    is_dedicated: bool,
    bot_name: &str,
) -> Option<Engagement> {
    if is_private {
        return Some(Engagement::Private);
    }

    let lower = text.to_lowercase();
    let named = lower.contains(&bot_name.to_lowercase());

    if mentions_bot {
        return Some(Engagement::Mention);
    }
    if named {
        return Some(Engagement::BotName);
    }

    if is_dedicated {
        if let Some(tag) = first_match(&DIRECTED_AT_BOT, &lower) {
            return Some(Engagement::DirectedAtBot(tag));
        }
    }

    first_match(&WANTS_DIRECT_MESSAGE, &lower).map(Engagement::WantsDirectMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_always_engages() {
        assert_eq!(
            should_engage("lol nice", true, false, false, "Guildbot"),
            Some(Engagement::Private)
        );
    }

    #[test]
    fn test_dedicated_channel_question_opener_engages() {
        assert_eq!(
            should_engage(
                "what do you think about rust?",
                false,
                false,
                true,
                "Guildbot"
            ),
            Some(Engagement::DirectedAtBot("question-opener"))
        );
    }

    #[test]
    fn test_non_dedicated_without_mention_stays_silent() {
        assert_eq!(
            should_engage("lol nice", false, false, false, "Guildbot"),
            None
        );
        // even question-shaped text stays silent outside the designated channel
        assert_eq!(
            should_engage("what is going on here?", false, false, false, "Guildbot"),
            None
        );
    }

    #[test]
    fn test_mention_engages_anywhere() {
        assert_eq!(
            should_engage("lol nice", false, true, false, "Guildbot"),
            Some(Engagement::Mention)
        );
    }

    #[test]
    fn test_bot_name_engages_case_insensitively() {
        assert_eq!(
            should_engage("guildbot settle this argument", false, false, false, "Guildbot"),
            Some(Engagement::BotName)
        );
    }

    #[test]
    fn test_dm_intent_engages_outside_dedicated_channel() {
        assert_eq!(
            should_engage("someone should dm me the plan", false, false, false, "Guildbot"),
            Some(Engagement::WantsDirectMessage("dm-me"))
        );
    }

    #[test]
    fn test_rule_sets_are_independent() {
        // a pure DM request matches the DM set but not directed-at-bot
        let lower = "please send a dm to alice about dinner";
        assert!(first_match(&DIRECTED_AT_BOT, lower).is_none());
        assert_eq!(first_match(&WANTS_DIRECT_MESSAGE, lower), Some("send-dm"));

        // a greeting matches directed-at-bot but not the DM set
        let lower = "hello everyone";
        assert_eq!(first_match(&DIRECTED_AT_BOT, lower), Some("greeting-opener"));
        assert!(first_match(&WANTS_DIRECT_MESSAGE, lower).is_none());
    }

    #[test]
    fn test_question_mark_rule_tolerates_trailing_space() {
        assert_eq!(
            should_engage("so that actually works? ", false, false, true, "Guildbot"),
            Some(Engagement::DirectedAtBot("question-mark"))
        );
    }
}
