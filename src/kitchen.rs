use std::collections::HashSet;
use std::sync::Mutex;

use teloxide::types::ChatId;

/// Chats with a recipe request in flight.
#[derive(Default)]
pub struct Kitchen {
    preparing: Mutex<HashSet<ChatId>>,
}

/// Marks a chat as preparing until dropped.
pub struct Ticket<'a> {
    kitchen: &'a Kitchen,
    chat_id: ChatId,
}

impl Kitchen {
    /// Claims the chat, or `None` if a meal is already being prepared for it.
    pub fn begin(&self, chat_id: ChatId) -> Option<Ticket<'_>> {
        let mut preparing = self.preparing.lock().unwrap_or_else(|e| e.into_inner());
        if !preparing.insert(chat_id) {
            return None;
        }
        Some(Ticket {
            kitchen: self,
            chat_id,
        })
    }

    #[cfg(test)]
    fn is_preparing(&self, chat_id: ChatId) -> bool {
        self.preparing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&chat_id)
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        self.kitchen
            .preparing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_is_rejected_while_preparing() {
        let kitchen = Kitchen::default();
        let ticket = kitchen.begin(ChatId(1));
        assert!(ticket.is_some());
        assert!(kitchen.is_preparing(ChatId(1)));
        assert!(kitchen.begin(ChatId(1)).is_none());
    }

    #[test]
    fn chats_are_independent() {
        let kitchen = Kitchen::default();
        let _first = kitchen.begin(ChatId(1)).unwrap();
        assert!(kitchen.begin(ChatId(2)).is_some());
    }

    #[test]
    fn dropping_the_ticket_frees_the_chat() {
        let kitchen = Kitchen::default();
        drop(kitchen.begin(ChatId(1)));
        assert!(!kitchen.is_preparing(ChatId(1)));
        assert!(kitchen.begin(ChatId(1)).is_some());
    }

    #[test]
    fn concurrent_claims_admit_exactly_one() {
        let kitchen = Kitchen::default();
        let tried = std::sync::Barrier::new(8);
        let admitted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let ticket = kitchen.begin(ChatId(7));
                        tried.wait();
                        ticket.is_some()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|admitted| *admitted)
                .count()
        });
        assert_eq!(admitted, 1);
        assert!(!kitchen.is_preparing(ChatId(7)));
    }
}
