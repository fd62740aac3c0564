//! Bounded in-memory conversation histories.

use crate::{ConversationKey, Role, Turn};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local store of per-conversation histories.
///
/// Histories are seeded lazily with a persona system turn on first
/// reference and live for the process lifetime; volatility across
/// restarts is accepted. Each mutation happens entirely under one lock
/// acquisition with no suspension point inside, so concurrent turns on the
/// same key interleaving at await points can never observe a half-applied
/// append or lose a trim.
#[derive(Debug)]
pub struct HistoryStore {
    bot_name: String,
    max_turns: usize,
    histories: Mutex<HashMap<ConversationKey, Vec<Turn>>>,
}

impl HistoryStore {
    pub fn new(bot_name: &str, max_turns: usize) -> Self {
        Self {
            bot_name: bot_name.to_string(),
            max_turns,
            histories: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the history for `key` if absent. Idempotent: a history that
    /// already exists is left untouched, whichever persona it was created
    /// with.
    ///
    /// Private surfaces get a persona without roster or DM-directive
    /// instructions; a private conversation must never be routed to a third
    /// party, so the model is not even told the syntax there.
    pub fn ensure(&self, key: ConversationKey, is_private: bool) {
        let mut histories = self.histories.lock().expect("history lock poisoned");
        histories.entry(key).or_insert_with(|| {
            let persona = if is_private {
                private_persona(&self.bot_name)
            } else {
                shared_persona(&self.bot_name)
            };
            vec![Turn::system(persona)]
        });
    }

    /// Append one turn, then trim back to the bound. The system turn is
    /// never evicted; the oldest non-system turn goes first.
    pub fn append(&self, key: ConversationKey, turn: Turn) {
        let mut histories = self.histories.lock().expect("history lock poisoned");
        let turns = histories.entry(key).or_default();
        turns.push(turn);

        let system_offset =
            usize::from(matches!(turns.first(), Some(turn) if turn.role == Role::System));
        while turns.len() - system_offset > self.max_turns {
            turns.remove(system_offset);
        }
    }

    /// The current turn sequence for `key`, empty when never referenced.
    pub fn snapshot(&self, key: ConversationKey) -> Vec<Turn> {
        self.histories
            .lock()
            .expect("history lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }
}

/// Persona for shared surfaces. Documents the DM directive the model may
/// emit and the condition for emitting it: an explicit request, never
/// inferred consent.
fn shared_persona(bot_name: &str) -> String {
    format!(
        "You are {bot_name}, a helpful assistant living in a Discord server. \
        You are good-humored and a little sarcastic: answer real questions \
        clearly, play along with questions asked for fun, and push back when \
        someone gives you grief. Keep answers short when you can. Messages \
        from the chat arrive labelled with the name of the person speaking; \
        use the labels to keep track of who said what, but never copy the \
        \"Name: text\" form into your own replies; always answer as \
        yourself. When you refer to server members you may use the real \
        names listed in the member context, matching the language the \
        conversation is happening in.\n\n\
        You can send a direct message to a server member by including \
        [DM:username:message] in a reply, but only when someone explicitly \
        asks you to send one. Never contact a third party on your own \
        initiative. After emitting a directive, mention in your public reply \
        that the message was sent and whether it went through."
    )
}

/// Persona for private conversations: same voice, no roster and no
/// directive syntax.
fn private_persona(bot_name: &str) -> String {
    format!(
        "You are {bot_name}, a helpful assistant chatting one-on-one in a \
        Discord direct message. You are good-humored and a little sarcastic: \
        answer real questions clearly, play along with questions asked for \
        fun, and push back when someone gives you grief. Keep answers short \
        when you can."
    )
}
