//! Memory trait: the conversation buffer an agent owns.
//!
//! Implementations keep messages in order, pin at most one system message at
//! index 0, and bound their size by evicting the oldest non-system message.

use crate::message::Message;

pub trait Memory: Send + Sync {
    /// Append a message, rotating out the oldest non-system message if full.
    fn add(&mut self, message: Message);

    /// Pin `message` as the system message. A no-op (apart from rotation)
    /// when the buffer already starts with one.
    fn add_system(&mut self, message: Message);

    fn has_system(&self) -> bool;

    /// The last `n` messages in order; fewer if the buffer is shorter.
    fn get_last_n(&self, n: usize) -> Vec<Message>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All messages, system first.
    fn messages(&self) -> &[Message];

    fn clear(&mut self);
}
