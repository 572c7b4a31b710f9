//! The per-session command queue.
//!
//! An ordered sequence of pending [`Command`] records with head and tail
//! insertion, single-consumer pop, a whole-queue flush, and the prefix
//! filter used for cooperative early termination.

use std::collections::VecDeque;

use crate::command::{Command, FilterSpec};

/// FIFO of pending dialplan commands.
#[derive(Debug, Default)]
pub struct CommandQueue {
    inner: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    /// Enqueue at the end. Commands without an application name are
    /// silently ignored.
    pub fn push_tail(&mut self, command: Command) {
        if command.application.is_empty() {
            return;
        }
        self.inner.push_back(command);
    }

    /// Enqueue at the front. Commands without an application name are
    /// silently ignored.
    pub fn push_head(&mut self, command: Command) {
        if command.application.is_empty() {
            return;
        }
        self.inner.push_front(command);
    }

    /// Take the next command in order.
    pub fn pop(&mut self) -> Option<Command> {
        self.inner.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Drop everything. Returns the number of commands discarded.
    pub fn flush(&mut self) -> usize {
        let dropped = self.inner.len();
        self.inner.clear();
        dropped
    }

    /// Drop a leading run of commands matching the filter specs.
    ///
    /// Specs and queue head are walked in lockstep: while the head matches
    /// the current spec it is popped and the same spec is retried, so a
    /// streak of same-application commands falls as one. When the head
    /// stops matching, the next spec gets a try against the same head.
    /// The walk ends at the first head no remaining spec matches, or when
    /// the queue runs dry. Only a prefix is ever removed; the survivors
    /// keep their order.
    ///
    /// Returns the number of commands dropped.
    pub fn filter(&mut self, specs: &[FilterSpec]) -> usize {
        let mut remaining = specs.iter();
        let Some(mut spec) = remaining.next() else {
            return 0;
        };

        let mut dropped = 0;
        loop {
            let Some(head) = self.inner.front() else {
                break;
            };
            if spec.matches(head) {
                self.inner.pop_front();
                dropped += 1;
            } else {
                match remaining.next() {
                    Some(next) => spec = next,
                    None => break,
                }
            }
        }
        dropped
    }

    /// Iterate the pending commands in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cmd(application: &str) -> Command {
        let mut fields = serde_json::Map::new();
        fields.insert("Application-Name".to_string(), json!(application));
        Command {
            application: application.to_string(),
            msg_id: None,
            call_id: None,
            group_id: None,
            fields,
        }
    }

    fn grouped(application: &str, group: &str) -> Command {
        let mut command = cmd(application);
        command.group_id = Some(group.to_string());
        command
            .fields
            .insert("Group-ID".to_string(), json!(group));
        command
    }

    fn apps(queue: &CommandQueue) -> Vec<String> {
        queue.iter().map(|c| c.application.clone()).collect()
    }

    #[test]
    fn pop_preserves_tail_order() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("a"));
        queue.push_tail(cmd("b"));
        queue.push_head(cmd("front"));

        assert_eq!(queue.pop().unwrap().application, "front");
        assert_eq!(queue.pop().unwrap().application, "a");
        assert_eq!(queue.pop().unwrap().application, "b");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn nameless_commands_are_ignored() {
        let mut queue = CommandQueue::new();
        let mut anonymous = cmd("x");
        anonymous.application = String::new();
        queue.push_tail(anonymous.clone());
        queue.push_head(anonymous);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_reports_dropped_count() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("a"));
        queue.push_tail(cmd("b"));
        assert_eq!(queue.flush(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn filter_pops_same_application_streak() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("playback"));
        queue.push_tail(cmd("playback"));
        queue.push_tail(cmd("bridge"));
        queue.push_tail(cmd("playback"));

        let specs = [FilterSpec::Application("playback".to_string())];
        assert_eq!(queue.filter(&specs), 2);
        // Only the leading run falls; the playback behind the bridge stays.
        assert_eq!(apps(&queue), vec!["bridge", "playback"]);
    }

    #[test]
    fn filter_advances_spec_on_mismatch() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("say"));
        queue.push_tail(cmd("playback"));
        queue.push_tail(cmd("bridge"));

        let specs = [
            FilterSpec::Application("playback".to_string()),
            FilterSpec::Application("say".to_string()),
        ];
        // The first spec misses the head, the second drops it. The spec
        // list never rewinds, so the playback behind it survives.
        assert_eq!(queue.filter(&specs), 1);
        assert_eq!(apps(&queue), vec!["playback", "bridge"]);
    }

    #[test]
    fn filter_with_fields_is_group_scoped() {
        let mut queue = CommandQueue::new();
        queue.push_tail(grouped("playback", "g1"));
        queue.push_tail(grouped("playback", "g1"));
        queue.push_tail(grouped("playback", "g2"));

        let specs = [FilterSpec::with_field("playback", "Group-ID", json!("g1"))];
        assert_eq!(queue.filter(&specs), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next().unwrap().group_id.as_deref(), Some("g2"));
    }

    #[test]
    fn filter_is_a_prefix_drop() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("bridge"));
        queue.push_tail(cmd("playback"));

        let specs = [FilterSpec::Application("playback".to_string())];
        assert_eq!(queue.filter(&specs), 0);
        assert_eq!(apps(&queue), vec!["bridge", "playback"]);
    }

    #[test]
    fn filter_with_no_specs_is_a_noop() {
        let mut queue = CommandQueue::new();
        queue.push_tail(cmd("playback"));
        assert_eq!(queue.filter(&[]), 0);
        assert_eq!(queue.len(), 1);
    }
}
