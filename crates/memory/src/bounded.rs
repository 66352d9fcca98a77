//! A bounded, in-process conversation buffer.
//!
//! The first message may be a pinned system message. Once the buffer is full,
//! every append evicts the oldest non-system message first, so the operating
//! instructions survive arbitrarily long runs. Evicting an assistant message
//! that requested tools also evicts the tool results answering it.

use std::collections::HashSet;

use clawflow_core::memory::Memory;
use clawflow_core::message::{Message, Role};
use tracing::debug;

pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Clone)]
pub struct BoundedMemory {
    messages: Vec<Message>,
    max_messages: usize,
}

impl BoundedMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn pinned(&self) -> usize {
        usize::from(self.has_system())
    }

    /// Evict until there is room for `incoming` more messages.
    fn rotate(&mut self, incoming: usize) {
        while self.messages.len() + incoming > self.max_messages {
            let start = self.pinned();
            let victim = self.messages[start..]
                .iter()
                .position(|m| m.role != Role::System)
                .map(|i| i + start)
                .or_else(|| (start < self.messages.len()).then_some(start));
            let Some(victim) = victim else {
                break;
            };
            let evicted = self.messages.remove(victim);
            debug!(role = evicted.role.as_str(), "Evicted message from memory");
            if evicted.has_tool_calls() {
                self.drop_orphan_results();
            }
        }
    }

    /// Remove tool results whose call is no longer in memory. A provider
    /// rejects a transcript with a tool message that answers nothing.
    fn drop_orphan_results(&mut self) {
        let mut known: HashSet<String> = HashSet::new();
        let before = self.messages.len();
        self.messages.retain(|m| {
            known.extend(m.tool_calls.iter().map(|c| c.id.clone()));
            m.role != Role::Tool
                || m.tool_call_id.as_ref().is_some_and(|id| known.contains(id))
        });
        let dropped = before - self.messages.len();
        if dropped > 0 {
            debug!(dropped, "Evicted tool results of an evicted call");
        }
    }
}

impl Default for BoundedMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl Memory for BoundedMemory {
    fn add(&mut self, message: Message) {
        self.rotate(1);
        let is_result = message.role == Role::Tool;
        self.messages.push(message);
        // Rotation may have just evicted the call this result answers.
        if is_result {
            self.drop_orphan_results();
        }
    }

    fn add_system(&mut self, message: Message) {
        if self.has_system() {
            self.rotate(0);
            return;
        }
        self.messages.insert(0, message);
        self.rotate(0);
    }

    fn has_system(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }

    fn get_last_n(&self, n: usize) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..].to_vec()
    }

    fn len(&self) -> usize {
        self.messages.len()
    }

    fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawflow_core::message::MessageToolCall;

    fn contents(mem: &BoundedMemory) -> Vec<&str> {
        mem.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn add_system_is_idempotent() {
        let mut mem = BoundedMemory::new(10);
        mem.add(Message::user("hi"));
        mem.add_system(Message::system("rules"));
        mem.add_system(Message::system("other rules"));
        assert!(mem.has_system());
        assert_eq!(contents(&mem), vec!["rules", "hi"]);
    }

    #[test]
    fn rotation_never_evicts_pinned_system() {
        let mut mem = BoundedMemory::new(3);
        mem.add_system(Message::system("rules"));
        for i in 0..5 {
            mem.add(Message::user(format!("m{i}")));
        }
        assert_eq!(mem.len(), 3);
        assert_eq!(contents(&mem), vec!["rules", "m3", "m4"]);
    }

    #[test]
    fn rotation_without_system_drops_oldest() {
        let mut mem = BoundedMemory::new(2);
        mem.add(Message::user("a"));
        mem.add(Message::assistant("b"));
        mem.add(Message::user("c"));
        assert_eq!(contents(&mem), vec!["b", "c"]);
    }

    #[test]
    fn rotation_prefers_non_system_notices() {
        let mut mem = BoundedMemory::new(3);
        mem.add_system(Message::system("rules"));
        mem.add(Message::system("New tools available: x"));
        mem.add(Message::user("q"));
        mem.add(Message::assistant("a"));
        assert_eq!(contents(&mem), vec!["rules", "New tools available: x", "a"]);
    }

    #[test]
    fn pinning_into_full_buffer_rotates() {
        let mut mem = BoundedMemory::new(2);
        mem.add(Message::user("a"));
        mem.add(Message::user("b"));
        mem.add_system(Message::system("rules"));
        assert_eq!(contents(&mem), vec!["rules", "b"]);
    }

    #[test]
    fn evicting_a_call_evicts_its_results() {
        let mut mem = BoundedMemory::new(4);
        mem.add_system(Message::system("rules"));
        mem.add(Message::user("list files"));
        mem.add(Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "list_directory".into(),
                arguments: "{}".into(),
            }],
        ));
        mem.add(Message::tool_result("call_1", "list_directory", "a.txt"));
        mem.add(Message::user("next"));
        mem.add(Message::assistant("done"));

        let roles: Vec<Role> = mem.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(contents(&mem), vec!["rules", "next", "done"]);
    }

    #[test]
    fn no_tool_result_outlives_its_call() {
        let mut mem = BoundedMemory::new(5);
        for i in 0..6 {
            let id = format!("call_{i}");
            mem.add(Message::assistant_with_tools(
                "",
                vec![
                    MessageToolCall {
                        id: format!("{id}a"),
                        name: "terminate".into(),
                        arguments: "{}".into(),
                    },
                    MessageToolCall {
                        id: format!("{id}b"),
                        name: "terminate".into(),
                        arguments: "{}".into(),
                    },
                ],
            ));
            mem.add(Message::tool_result(format!("{id}a"), "terminate", "ok"));
            mem.add(Message::tool_result(format!("{id}b"), "terminate", "ok"));

            let messages = mem.messages();
            assert!(messages.len() <= 5);
            for (pos, m) in messages.iter().enumerate() {
                if m.role != Role::Tool {
                    continue;
                }
                let id = m.tool_call_id.as_deref().unwrap();
                assert!(
                    messages[..pos]
                        .iter()
                        .any(|prior| prior.tool_calls.iter().any(|c| c.id == id)),
                    "tool result {id} has no call"
                );
            }
        }
    }

    #[test]
    fn tiny_buffer_drops_result_of_evicted_call() {
        let mut mem = BoundedMemory::new(2);
        mem.add_system(Message::system("rules"));
        mem.add(Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "c".into(),
                name: "terminate".into(),
                arguments: "{}".into(),
            }],
        ));
        mem.add(Message::tool_result("c", "terminate", "ok"));
        assert_eq!(contents(&mem), vec!["rules"]);
    }

    #[test]
    fn get_last_n_clamps() {
        let mut mem = BoundedMemory::default();
        mem.add(Message::user("a"));
        mem.add(Message::user("b"));
        assert_eq!(mem.get_last_n(1)[0].content, "b");
        assert_eq!(mem.get_last_n(10).len(), 2);
        mem.clear();
        assert!(mem.is_empty());
    }
}
