//! Toast/notification queue.
//!
//! Toasts are kept in creation order. A toast bound to an entity supersedes
//! any older toast of the same kind for that entity, so there is never more
//! than one undo countdown per entity on screen.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::{TimerId, TimerIdSource};
use crate::model::EntityKey;
use crate::{ERROR_TOAST_TTL, SUCCESS_TOAST_TTL};

/// Locally generated toast id, rendered as `t1`, `t2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ToastId(u64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid toast id '{0}'")]
pub struct InvalidToastId(String);

impl ToastId {
    pub fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<ToastId> for String {
    fn from(id: ToastId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ToastId {
    type Error = InvalidToastId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .strip_prefix('t')
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map(ToastId)
            .ok_or(InvalidToastId(value))
    }
}

impl std::str::FromStr for ToastId {
    type Err = InvalidToastId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Confirm,
    Undo,
    Success,
    Error,
}

impl ToastKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToastKind::Confirm => "confirm",
            ToastKind::Undo => "undo",
            ToastKind::Success => "success",
            ToastKind::Error => "error",
        }
    }

    /// How long the toast stays up without user action. Confirm and undo
    /// toasts are dismissed by their owner.
    pub fn ttl(self) -> Option<Duration> {
        match self {
            ToastKind::Success => Some(SUCCESS_TOAST_TTL),
            ToastKind::Error => Some(ERROR_TOAST_TTL),
            ToastKind::Confirm | ToastKind::Undo => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastEntry {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub target: Option<EntityKey>,
    /// Seconds left, for undo toasts.
    pub countdown: Option<u32>,
}

/// A toast waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub target: Option<EntityKey>,
    pub countdown: Option<u32>,
}

impl NewToast {
    pub fn new(kind: ToastKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            target: None,
            countdown: None,
        }
    }

    pub fn confirm(target: EntityKey, label: &str) -> Self {
        Self::new(
            ToastKind::Confirm,
            format!("Delete {}?", target.collection.noun().to_lowercase()),
            format!("\"{label}\" will be deleted."),
        )
        .with_target(target)
    }

    pub fn undo(target: EntityKey, label: &str, seconds: u32) -> Self {
        let mut toast = Self::new(
            ToastKind::Undo,
            format!("{} deleted", target.collection.noun()),
            undo_message(label, seconds),
        )
        .with_target(target);
        toast.countdown = Some(seconds);
        toast
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, title, message)
    }

    #[must_use]
    pub fn with_target(mut self, target: EntityKey) -> Self {
        self.target = Some(target);
        self
    }
}

/// Undo toast body for `seconds` left on the clock.
pub fn undo_message(label: &str, seconds: u32) -> String {
    match seconds {
        1 => format!("\"{label}\" will be deleted in 1 second. Undo?"),
        n => format!("\"{label}\" will be deleted in {n} seconds. Undo?"),
    }
}

/// Timer work the queue needs the shell to do for expiring toasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Start { id: TimerId, after: Duration },
    Cancel(TimerId),
}

#[derive(Debug, Clone, Default)]
pub struct ToastQueue {
    last_seq: u64,
    entries: BTreeMap<u64, ToastEntry>,
    by_target: HashMap<(EntityKey, ToastKind), ToastId>,
    awaiting_expiry: Vec<ToastId>,
    expiries: HashMap<TimerId, ToastId>,
    cancelled: Vec<TimerId>,
}

impl ToastQueue {
    pub fn enqueue(&mut self, toast: NewToast) -> ToastId {
        if let Some(target) = &toast.target {
            if let Some(previous) = self.by_target.get(&(target.clone(), toast.kind)).copied() {
                tracing::debug!(toast = %previous, target = %target, "superseding toast");
                self.dismiss(previous);
            }
        }

        self.last_seq += 1;
        let id = ToastId(self.last_seq);

        if let Some(target) = &toast.target {
            self.by_target.insert((target.clone(), toast.kind), id);
        }
        if toast.kind.ttl().is_some() {
            self.awaiting_expiry.push(id);
        }

        tracing::debug!(toast = %id, kind = toast.kind.as_str(), "toast enqueued");
        self.entries.insert(
            id.0,
            ToastEntry {
                id,
                kind: toast.kind,
                title: toast.title,
                message: toast.message,
                target: toast.target,
                countdown: toast.countdown,
            },
        );
        id
    }

    /// Removes a toast. Dismissing an unknown id is a no-op.
    pub fn dismiss(&mut self, id: ToastId) -> Option<ToastEntry> {
        let entry = self.entries.remove(&id.0)?;

        if let Some(target) = &entry.target {
            let key = (target.clone(), entry.kind);
            if self.by_target.get(&key) == Some(&id) {
                self.by_target.remove(&key);
            }
        }
        self.awaiting_expiry.retain(|pending| *pending != id);
        let armed: Vec<TimerId> = self
            .expiries
            .iter()
            .filter(|(_, toast)| **toast == id)
            .map(|(timer, _)| *timer)
            .collect();
        for timer in armed {
            self.expiries.remove(&timer);
            self.cancelled.push(timer);
        }

        tracing::debug!(toast = %id, "toast dismissed");
        Some(entry)
    }

    /// Removes every toast bound to `target`.
    pub fn dismiss_target(&mut self, target: &EntityKey) -> Vec<ToastEntry> {
        let ids: Vec<ToastId> = self
            .entries
            .values()
            .filter(|entry| entry.target.as_ref() == Some(target))
            .map(|entry| entry.id)
            .collect();
        ids.into_iter().filter_map(|id| self.dismiss(id)).collect()
    }

    pub fn update_countdown(
        &mut self,
        id: ToastId,
        seconds: u32,
        message: impl Into<String>,
    ) -> bool {
        match self.entries.get_mut(&id.0) {
            Some(entry) => {
                entry.countdown = Some(seconds);
                entry.message = message.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ToastId) -> Option<&ToastEntry> {
        self.entries.get(&id.0)
    }

    /// Toasts oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ToastEntry> {
        self.entries.values()
    }

    pub fn find(&self, target: &EntityKey, kind: ToastKind) -> Option<&ToastEntry> {
        self.by_target
            .get(&(target.clone(), kind))
            .and_then(|id| self.get(*id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        let ids: Vec<ToastId> = self.entries.values().map(|entry| entry.id).collect();
        for id in ids {
            self.dismiss(id);
        }
    }

    /// Hands out timers for toasts enqueued since the last call and collects
    /// cancellations for toasts dismissed before their expiry.
    pub fn take_timer_commands(&mut self, ids: &mut TimerIdSource) -> Vec<TimerCommand> {
        let mut commands: Vec<TimerCommand> =
            self.cancelled.drain(..).map(TimerCommand::Cancel).collect();

        for toast in std::mem::take(&mut self.awaiting_expiry) {
            let Some(after) = self.get(toast).and_then(|entry| entry.kind.ttl()) else {
                continue;
            };
            let timer = ids.next_id();
            self.expiries.insert(timer, toast);
            commands.push(TimerCommand::Start { id: timer, after });
        }
        commands
    }

    pub fn owns_timer(&self, timer: TimerId) -> bool {
        self.expiries.contains_key(&timer)
    }

    /// Dismisses the toast whose expiry timer fired. Timers that were
    /// cancelled in the meantime are ignored.
    pub fn expiry_fired(&mut self, timer: TimerId) -> Option<ToastEntry> {
        let toast = self.expiries.remove(&timer)?;
        tracing::debug!(toast = %toast, timer = %timer, "toast expired");
        self.dismiss(toast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Collection;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn board(id: &str) -> EntityKey {
        EntityKey::board(id)
    }

    #[test]
    fn ids_render_with_prefix_and_increase() {
        let mut queue = ToastQueue::default();
        let first = queue.enqueue(NewToast::confirm(board("b1"), "Visa notices"));
        let second = queue.enqueue(NewToast::success("Saved", "Board saved"));

        assert_eq!(first.to_string(), "t1");
        assert_eq!(second.to_string(), "t2");
        assert!(second > first);
    }

    #[test]
    fn toast_id_serializes_as_string() {
        let id = ToastId(7);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!("t7"));
        let parsed: ToastId = serde_json::from_value(serde_json::json!("t7")).unwrap();
        assert_eq!(parsed, id);
        assert!("x7".parse::<ToastId>().is_err());
        assert!("t0".parse::<ToastId>().is_err());
    }

    #[test]
    fn iteration_is_oldest_first() {
        let mut queue = ToastQueue::default();
        queue.enqueue(NewToast::error("Failed", "one"));
        queue.enqueue(NewToast::success("Done", "two"));
        queue.enqueue(NewToast::success("Done", "three"));

        let messages: Vec<&str> = queue.iter().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["one", "two", "three"]);
    }

    #[test]
    fn same_kind_for_same_target_supersedes() {
        let mut queue = ToastQueue::default();
        let first = queue.enqueue(NewToast::undo(board("b1"), "A", 5));
        let second = queue.enqueue(NewToast::undo(board("b1"), "A", 5));

        assert_eq!(queue.len(), 1);
        assert!(queue.get(first).is_none());
        assert_eq!(queue.find(&board("b1"), ToastKind::Undo).map(|t| t.id), Some(second));
    }

    #[test]
    fn different_targets_do_not_interfere() {
        let mut queue = ToastQueue::default();
        queue.enqueue(NewToast::undo(board("b1"), "A", 5));
        queue.enqueue(NewToast::undo(board("b2"), "B", 5));
        queue.enqueue(NewToast::undo(EntityKey::new(Collection::Staff, "b1"), "C", 5));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn dismiss_unknown_is_noop() {
        let mut queue = ToastQueue::default();
        assert!(queue.dismiss(ToastId(42)).is_none());
        assert!(!queue.update_countdown(ToastId(42), 3, undo_message("A", 3)));
    }

    #[test]
    fn countdown_updates_in_place() {
        let mut queue = ToastQueue::default();
        let id = queue.enqueue(NewToast::undo(board("b1"), "A", 5));
        assert_eq!(
            queue.get(id).map(|t| t.message.as_str()),
            Some("\"A\" will be deleted in 5 seconds. Undo?")
        );

        assert!(queue.update_countdown(id, 1, undo_message("A", 1)));
        let toast = queue.get(id).unwrap();
        assert_eq!(toast.countdown, Some(1));
        assert_eq!(toast.message, "\"A\" will be deleted in 1 second. Undo?");
    }

    #[test]
    fn dismiss_target_removes_all_its_toasts() {
        let mut queue = ToastQueue::default();
        queue.enqueue(NewToast::confirm(board("b1"), "A"));
        queue.enqueue(NewToast::undo(board("b1"), "A", 5));
        queue.enqueue(NewToast::confirm(board("b2"), "B"));

        let removed = queue.dismiss_target(&board("b1"));
        assert_eq!(removed.len(), 2);
        assert_eq!(queue.len(), 1);
        assert!(queue.find(&board("b1"), ToastKind::Undo).is_none());
    }

    #[test]
    fn success_and_error_toasts_get_expiry_timers() {
        let mut queue = ToastQueue::default();
        let mut ids = TimerIdSource::default();
        queue.enqueue(NewToast::confirm(board("b1"), "A"));
        let ok = queue.enqueue(NewToast::success("Done", "ok"));
        queue.enqueue(NewToast::error("Failed", "no"));

        let commands = queue.take_timer_commands(&mut ids);
        assert_eq!(
            commands,
            vec![
                TimerCommand::Start { id: TimerId(1), after: SUCCESS_TOAST_TTL },
                TimerCommand::Start { id: TimerId(2), after: ERROR_TOAST_TTL },
            ]
        );
        assert!(queue.take_timer_commands(&mut ids).is_empty());

        let expired = queue.expiry_fired(TimerId(1));
        assert_eq!(expired.map(|t| t.id), Some(ok));
        assert_eq!(queue.len(), 2);
        assert!(queue.expiry_fired(TimerId(1)).is_none());
    }

    #[test]
    fn early_dismiss_cancels_expiry() {
        let mut queue = ToastQueue::default();
        let mut ids = TimerIdSource::default();
        let id = queue.enqueue(NewToast::success("Done", "ok"));
        queue.take_timer_commands(&mut ids);

        queue.dismiss(id);
        assert!(!queue.owns_timer(TimerId(1)));
        assert_eq!(queue.take_timer_commands(&mut ids), vec![TimerCommand::Cancel(TimerId(1))]);
        assert_matches!(queue.expiry_fired(TimerId(1)), None);
    }

    #[test]
    fn dismissed_before_arming_never_gets_a_timer() {
        let mut queue = ToastQueue::default();
        let mut ids = TimerIdSource::default();
        let id = queue.enqueue(NewToast::error("Failed", "no"));
        queue.dismiss(id);
        assert!(queue.take_timer_commands(&mut ids).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push { kind: u8, target: Option<u8> },
        Dismiss(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, proptest::option::of(0u8..3))
                .prop_map(|(kind, target)| Op::Push { kind, target }),
            (0usize..8).prop_map(Op::Dismiss),
        ]
    }

    fn kind(n: u8) -> ToastKind {
        match n {
            0 => ToastKind::Confirm,
            1 => ToastKind::Undo,
            2 => ToastKind::Success,
            _ => ToastKind::Error,
        }
    }

    proptest! {
        #[test]
        fn queue_stays_ordered_and_unique_per_target(ops in proptest::collection::vec(op(), 0..40)) {
            let mut queue = ToastQueue::default();
            for op in ops {
                match op {
                    Op::Push { kind: k, target } => {
                        let mut toast = NewToast::new(kind(k), "title", "message");
                        if let Some(t) = target {
                            toast = toast.with_target(board(&format!("b{t}")));
                        }
                        queue.enqueue(toast);
                    }
                    Op::Dismiss(n) => {
                        let id = queue.iter().nth(n).map(|t| t.id);
                        if let Some(id) = id {
                            prop_assert!(queue.dismiss(id).is_some());
                        }
                    }
                }
            }

            let ids: Vec<ToastId> = queue.iter().map(|t| t.id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));

            let mut seen = std::collections::HashSet::new();
            for toast in queue.iter() {
                if let Some(target) = &toast.target {
                    prop_assert!(seen.insert((target.clone(), toast.kind)));
                }
            }
        }
    }
}
