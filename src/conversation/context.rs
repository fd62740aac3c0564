//! Assembly of the turn sequence submitted to the completion service.

use crate::actions::ActionLog;
use crate::conversation::history::HistoryStore;
use crate::roster::{Identity, RosterSnapshot};
use crate::{ConversationKey, Turn};

/// Build the exact ordered turn sequence for one completion call.
///
/// Shared surfaces get the live roster description and a digest of recent
/// direct messages appended to a *copy* of the system turn. The stored
/// system turn is never touched, so repeated calls cannot compound the
/// appendix. Private surfaces (no roster) submit the base history as-is.
pub fn assemble(
    history: &HistoryStore,
    actions: &ActionLog,
    key: ConversationKey,
    is_private: bool,
    roster: Option<&RosterSnapshot>,
) -> Vec<Turn> {
    history.ensure(key, is_private);
    let mut turns = history.snapshot(key);

    let Some(roster) = roster else {
        return turns;
    };

    let roster_context = describe_roster(roster);
    let action_context = actions.digest();
    if roster_context.is_none() && action_context.is_none() {
        return turns;
    }

    // `turns` is a snapshot clone; mutating its first element leaves the
    // stored system turn unchanged.
    if let Some(system) = turns.first_mut() {
        if let Some(description) = roster_context {
            system.content.push_str("\n\nServer members: ");
            system.content.push_str(&description);
        }
        if let Some(digest) = action_context {
            system.content.push_str("\n\nRecent direct messages sent: ");
            system.content.push_str(&digest);
        }
    }

    turns
}

fn describe_roster(roster: &RosterSnapshot) -> Option<String> {
    if roster.is_empty() {
        return None;
    }

    let lines: Vec<String> = roster.members().iter().map(Identity::describe).collect();
    Some(lines.join(", "))
}
