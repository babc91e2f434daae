//! Delete with confirmation and a timed undo window.
//!
//! The controller is a pure state machine over [`PendingDeletion`]s. It
//! mutates the toast queue directly and returns [`UndoCommand`]s for the
//! work only the shell can do: running timers and issuing the DELETE.
//!
//! ```text
//! Idle --request--> Confirming --confirm--> CountingDown --commit timer--> Committing --complete--> Idle
//!                       |                        |
//!                    decline                    undo
//!                       v                        v
//!                     Idle                     Idle
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::{TimerId, TimerIdSource};
use crate::model::EntityKey;
use crate::toast::{undo_message, NewToast, ToastId, ToastQueue};
use crate::{AppError, COUNTDOWN_TICK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoCommand {
    StartTimer { id: TimerId, after: Duration },
    CancelTimer(TimerId),
    IssueDelete(EntityKey),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UndoError {
    #[error("a deletion of {0} is already pending")]
    AlreadyPending(EntityKey),
    #[error("{0} is not awaiting confirmation")]
    NotConfirming(EntityKey),
    #[error("cannot delete a {} without an id", .0.noun().to_lowercase())]
    MissingId(crate::model::Collection),
}

impl From<UndoError> for AppError {
    fn from(e: UndoError) -> Self {
        AppError::new(crate::ErrorKind::Conflict, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPhase {
    Confirming {
        toast: ToastId,
    },
    CountingDown {
        toast: ToastId,
        tick: Option<TimerId>,
        commit: TimerId,
        remaining: u32,
    },
    /// DELETE issued, waiting for the response.
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    pub target: EntityKey,
    pub label: String,
    pub phase: DeletionPhase,
}

impl PendingDeletion {
    pub fn remaining(&self) -> Option<u32> {
        match self.phase {
            DeletionPhase::CountingDown { remaining, .. } => Some(remaining),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerRole {
    Tick,
    Commit,
}

#[derive(Debug, Clone)]
pub struct DeleteUndoController {
    window_secs: u32,
    pending: BTreeMap<EntityKey, PendingDeletion>,
    timers: HashMap<TimerId, (EntityKey, TimerRole)>,
}

impl DeleteUndoController {
    pub fn new(window_secs: u32) -> Self {
        Self {
            window_secs: window_secs.max(1),
            pending: BTreeMap::new(),
            timers: HashMap::new(),
        }
    }

    pub fn window_secs(&self) -> u32 {
        self.window_secs
    }

    /// Applies to deletions confirmed from now on.
    pub fn set_window_secs(&mut self, window_secs: u32) {
        self.window_secs = window_secs.max(1);
    }

    pub fn pending(&self, target: &EntityKey) -> Option<&PendingDeletion> {
        self.pending.get(target)
    }

    pub fn is_pending(&self, target: &EntityKey) -> bool {
        self.pending.contains_key(target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingDeletion> {
        self.pending.values()
    }

    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Asks the user to confirm deleting `target`.
    pub fn request(
        &mut self,
        target: EntityKey,
        label: String,
        toasts: &mut ToastQueue,
    ) -> Result<ToastId, UndoError> {
        if target.id.trim().is_empty() {
            return Err(UndoError::MissingId(target.collection));
        }
        if self.pending.contains_key(&target) {
            return Err(UndoError::AlreadyPending(target));
        }

        let toast = toasts.enqueue(NewToast::confirm(target.clone(), &label));
        tracing::info!(target = %target, toast = %toast, "delete requested");
        self.pending.insert(
            target.clone(),
            PendingDeletion {
                target,
                label,
                phase: DeletionPhase::Confirming { toast },
            },
        );
        Ok(toast)
    }

    /// Starts the undo window: an undo toast, a one-second tick and the
    /// commit timer.
    pub fn confirm(
        &mut self,
        target: &EntityKey,
        toasts: &mut ToastQueue,
        ids: &mut TimerIdSource,
    ) -> Result<Vec<UndoCommand>, UndoError> {
        let window = self.window_secs;
        let Some(pending) = self.pending.get_mut(target) else {
            return Err(UndoError::NotConfirming(target.clone()));
        };
        let DeletionPhase::Confirming { toast: confirm_toast } = pending.phase else {
            return Err(UndoError::NotConfirming(target.clone()));
        };

        toasts.dismiss(confirm_toast);
        let toast = toasts.enqueue(NewToast::undo(target.clone(), &pending.label, window));

        let tick = ids.next_id();
        let commit = ids.next_id();
        pending.phase = DeletionPhase::CountingDown {
            toast,
            tick: Some(tick),
            commit,
            remaining: window,
        };
        self.timers.insert(tick, (target.clone(), TimerRole::Tick));
        self.timers.insert(commit, (target.clone(), TimerRole::Commit));

        tracing::info!(target = %target, window, "delete confirmed, undo window open");
        Ok(vec![
            UndoCommand::StartTimer {
                id: tick,
                after: COUNTDOWN_TICK,
            },
            UndoCommand::StartTimer {
                id: commit,
                after: COUNTDOWN_TICK * window,
            },
        ])
    }

    /// The user dismissed the confirmation.
    pub fn decline(&mut self, target: &EntityKey, toasts: &mut ToastQueue) -> bool {
        match self.pending.get(target).map(|p| &p.phase) {
            Some(DeletionPhase::Confirming { toast }) => {
                toasts.dismiss(*toast);
                self.pending.remove(target);
                tracing::debug!(target = %target, "delete declined");
                true
            }
            _ => false,
        }
    }

    /// Cancels a deletion inside its undo window. Anything else is a no-op.
    pub fn undo(&mut self, target: &EntityKey, toasts: &mut ToastQueue) -> Vec<UndoCommand> {
        let Some(DeletionPhase::CountingDown { tick, commit, .. }) =
            self.pending.get(target).map(|p| p.phase.clone())
        else {
            tracing::debug!(target = %target, "undo ignored, nothing to cancel");
            return Vec::new();
        };

        // Timers go first so a fire racing this undo finds nothing to act on.
        let mut commands = Vec::with_capacity(2);
        for id in tick.into_iter().chain(std::iter::once(commit)) {
            self.timers.remove(&id);
            commands.push(UndoCommand::CancelTimer(id));
        }

        let label = self
            .pending
            .remove(target)
            .map(|p| p.label)
            .unwrap_or_default();
        toasts.dismiss_target(target);
        toasts.enqueue(
            NewToast::success("Deletion cancelled", format!("\"{label}\" was kept."))
                .with_target(target.clone()),
        );

        tracing::info!(target = %target, "delete undone");
        commands
    }

    pub fn timer_fired(
        &mut self,
        id: TimerId,
        toasts: &mut ToastQueue,
        ids: &mut TimerIdSource,
    ) -> Vec<UndoCommand> {
        let Some((target, role)) = self.timers.remove(&id) else {
            return Vec::new();
        };
        let Some(pending) = self.pending.get_mut(&target) else {
            return Vec::new();
        };
        let DeletionPhase::CountingDown {
            toast,
            tick,
            commit,
            remaining,
        } = pending.phase
        else {
            return Vec::new();
        };

        match role {
            TimerRole::Tick => {
                let remaining = remaining.saturating_sub(1);
                let message = undo_message(&pending.label, remaining);
                toasts.update_countdown(toast, remaining, message);

                let mut commands = Vec::new();
                let next = if remaining > 0 {
                    let next = ids.next_id();
                    self.timers.insert(next, (target.clone(), TimerRole::Tick));
                    commands.push(UndoCommand::StartTimer {
                        id: next,
                        after: COUNTDOWN_TICK,
                    });
                    Some(next)
                } else {
                    None
                };
                pending.phase = DeletionPhase::CountingDown {
                    toast,
                    tick: next,
                    commit,
                    remaining,
                };
                tracing::debug!(target = %target, remaining, "undo countdown");
                commands
            }
            TimerRole::Commit => {
                let mut commands = Vec::with_capacity(2);
                if let Some(tick) = tick {
                    self.timers.remove(&tick);
                    commands.push(UndoCommand::CancelTimer(tick));
                }
                toasts.dismiss(toast);
                pending.phase = DeletionPhase::Committing;
                tracing::info!(target = %target, "undo window closed, deleting");
                commands.push(UndoCommand::IssueDelete(target));
                commands
            }
        }
    }

    /// Records the DELETE outcome. Local lists were never touched before
    /// this point, so a failure needs no rollback.
    pub fn complete(
        &mut self,
        target: &EntityKey,
        outcome: Result<(), AppError>,
        toasts: &mut ToastQueue,
    ) -> bool {
        if !matches!(
            self.pending.get(target).map(|p| &p.phase),
            Some(DeletionPhase::Committing)
        ) {
            tracing::warn!(target = %target, "delete result for a target not being committed");
            return false;
        }
        let label = self
            .pending
            .remove(target)
            .map(|p| p.label)
            .unwrap_or_default();

        let toast = match outcome {
            Ok(()) => {
                tracing::info!(target = %target, "deleted");
                NewToast::success(
                    format!("{} deleted", target.collection.noun()),
                    format!("\"{label}\" was deleted."),
                )
            }
            Err(error) => {
                tracing::warn!(target = %target, error = %error, "delete failed");
                NewToast::error("Delete failed", error.user_facing_message())
            }
        };
        toasts.enqueue(toast.with_target(target.clone()));
        true
    }

    /// Drops every pending deletion, e.g. on sign-out. Deletions already
    /// committing are forgotten; their DELETE is in flight.
    pub fn cancel_all(&mut self, toasts: &mut ToastQueue) -> Vec<UndoCommand> {
        let mut ids: Vec<TimerId> = self.timers.drain().map(|(id, _)| id).collect();
        ids.sort();
        for target in std::mem::take(&mut self.pending).into_keys() {
            toasts.dismiss_target(&target);
        }
        ids.into_iter().map(UndoCommand::CancelTimer).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Collection;
    use crate::toast::ToastKind;
    use crate::ErrorKind;
    use assert_matches::assert_matches;

    struct Harness {
        controller: DeleteUndoController,
        toasts: ToastQueue,
        ids: TimerIdSource,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                controller: DeleteUndoController::new(5),
                toasts: ToastQueue::default(),
                ids: TimerIdSource::default(),
            }
        }

        fn confirm(&mut self, target: &EntityKey) -> Vec<UndoCommand> {
            self.controller
                .confirm(target, &mut self.toasts, &mut self.ids)
                .unwrap()
        }

        fn fire(&mut self, id: TimerId) -> Vec<UndoCommand> {
            self.controller
                .timer_fired(id, &mut self.toasts, &mut self.ids)
        }

        fn started(commands: &[UndoCommand]) -> Vec<TimerId> {
            commands
                .iter()
                .filter_map(|c| match c {
                    UndoCommand::StartTimer { id, .. } => Some(*id),
                    _ => None,
                })
                .collect()
        }
    }

    fn b1() -> EntityKey {
        EntityKey::board("b1")
    }

    #[test]
    fn request_enqueues_confirm_toast() {
        let mut h = Harness::new();
        let toast = h
            .controller
            .request(b1(), "Visa".into(), &mut h.toasts)
            .unwrap();

        assert_eq!(toast.to_string(), "t1");
        assert_eq!(h.toasts.get(toast).map(|t| t.kind), Some(ToastKind::Confirm));
        assert_matches!(
            h.controller.request(b1(), "Visa".into(), &mut h.toasts),
            Err(UndoError::AlreadyPending(_))
        );
    }

    #[test]
    fn request_without_id_is_refused() {
        let mut h = Harness::new();
        for id in ["", "  "] {
            assert_matches!(
                h.controller.request(EntityKey::board(id), "Untitled".into(), &mut h.toasts),
                Err(UndoError::MissingId(Collection::Boards))
            );
        }
        assert_eq!(h.controller.iter().count(), 0);
        assert!(h.toasts.is_empty());
    }

    #[test]
    fn confirm_requires_request() {
        let mut h = Harness::new();
        assert_matches!(
            h.controller.confirm(&b1(), &mut h.toasts, &mut h.ids),
            Err(UndoError::NotConfirming(_))
        );
    }

    #[test]
    fn decline_returns_to_idle() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        assert!(h.controller.decline(&b1(), &mut h.toasts));
        assert!(!h.controller.is_pending(&b1()));
        assert!(h.toasts.is_empty());
        assert!(!h.controller.decline(&b1(), &mut h.toasts));
    }

    #[test]
    fn confirm_starts_tick_and_commit_timers() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());

        assert_eq!(
            commands,
            vec![
                UndoCommand::StartTimer { id: TimerId(1), after: Duration::from_secs(1) },
                UndoCommand::StartTimer { id: TimerId(2), after: Duration::from_secs(5) },
            ]
        );
        let undo = h.toasts.find(&b1(), ToastKind::Undo).unwrap();
        assert_eq!(undo.countdown, Some(5));
        assert!(h.toasts.find(&b1(), ToastKind::Confirm).is_none());
    }

    #[test]
    fn countdown_walks_down_then_commits() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());
        let [mut tick, commit] = Harness::started(&commands)[..] else {
            panic!("expected two timers");
        };

        let mut shown = Vec::new();
        loop {
            let next = h.fire(tick);
            shown.push(h.controller.pending(&b1()).and_then(PendingDeletion::remaining));
            match Harness::started(&next).first() {
                Some(id) => tick = *id,
                None => break,
            }
        }
        assert_eq!(shown, vec![Some(4), Some(3), Some(2), Some(1), Some(0)]);

        let commands = h.fire(commit);
        assert_eq!(commands, vec![UndoCommand::IssueDelete(b1())]);
        assert!(h.toasts.find(&b1(), ToastKind::Undo).is_none());
        assert_matches!(
            h.controller.pending(&b1()).map(|p| &p.phase),
            Some(DeletionPhase::Committing)
        );
    }

    #[test]
    fn commit_before_last_tick_cancels_the_tick() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());
        let [tick, commit] = Harness::started(&commands)[..] else {
            panic!("expected two timers");
        };

        let commands = h.fire(commit);
        assert_eq!(
            commands,
            vec![UndoCommand::CancelTimer(tick), UndoCommand::IssueDelete(b1())]
        );
        assert!(h.fire(tick).is_empty());
    }

    #[test]
    fn undo_cancels_timers_and_reports() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());
        let [tick, commit] = Harness::started(&commands)[..] else {
            panic!("expected two timers");
        };

        let commands = h.controller.undo(&b1(), &mut h.toasts);
        assert_eq!(
            commands,
            vec![UndoCommand::CancelTimer(tick), UndoCommand::CancelTimer(commit)]
        );
        assert!(!h.controller.is_pending(&b1()));
        assert!(!h.controller.owns_timer(commit));

        let toasts: Vec<_> = h.toasts.iter().collect();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Success);
        assert_eq!(toasts[0].title, "Deletion cancelled");

        // A commit that was already in flight at the shell is ignored.
        assert!(h.fire(commit).is_empty());
    }

    #[test]
    fn undo_after_commit_is_a_no_op() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());
        let commit = Harness::started(&commands)[1];
        h.fire(commit);

        assert!(h.controller.undo(&b1(), &mut h.toasts).is_empty());
        assert!(h.controller.complete(&b1(), Ok(()), &mut h.toasts));
        assert!(h.controller.undo(&b1(), &mut h.toasts).is_empty());
    }

    #[test]
    fn undo_without_request_is_a_no_op() {
        let mut h = Harness::new();
        assert!(h.controller.undo(&b1(), &mut h.toasts).is_empty());
        assert!(h.toasts.is_empty());
    }

    #[test]
    fn failed_delete_shows_error_toast() {
        let mut h = Harness::new();
        h.controller.request(b1(), "Visa".into(), &mut h.toasts).unwrap();
        let commands = h.confirm(&b1());
        h.fire(Harness::started(&commands)[1]);

        let error = AppError::new(ErrorKind::Authorization, "nope");
        assert!(h.controller.complete(&b1(), Err(error), &mut h.toasts));

        let toast = h.toasts.find(&b1(), ToastKind::Error).unwrap();
        assert_eq!(toast.title, "Delete failed");
        assert!(!h.controller.is_pending(&b1()));
    }

    #[test]
    fn complete_for_unknown_target_is_ignored() {
        let mut h = Harness::new();
        assert!(!h.controller.complete(&b1(), Ok(()), &mut h.toasts));
        assert!(h.toasts.is_empty());
    }

    #[test]
    fn cancel_all_clears_everything() {
        let mut h = Harness::new();
        h.controller.request(b1(), "A".into(), &mut h.toasts).unwrap();
        h.confirm(&b1());
        h.controller
            .request(EntityKey::board("b2"), "B".into(), &mut h.toasts)
            .unwrap();

        let commands = h.controller.cancel_all(&mut h.toasts);
        assert_eq!(
            commands,
            vec![UndoCommand::CancelTimer(TimerId(1)), UndoCommand::CancelTimer(TimerId(2))]
        );
        assert_eq!(h.controller.iter().count(), 0);
        assert!(h.toasts.is_empty());
    }

    #[test]
    fn toast_scenario_matches_dashboard_flow() {
        let mut h = Harness::new();
        let confirm = h
            .controller
            .request(b1(), "Visa".into(), &mut h.toasts)
            .unwrap();
        assert_eq!(confirm.to_string(), "t1");

        let commands = h.confirm(&b1());
        let [mut tick, commit] = Harness::started(&commands)[..] else {
            panic!("expected two timers");
        };
        let undo: Vec<_> = h.toasts.iter().collect();
        assert_eq!(undo.len(), 1);
        assert_eq!(undo[0].kind, ToastKind::Undo);
        assert_eq!(undo[0].countdown, Some(5));

        for _ in 0..3 {
            tick = Harness::started(&h.fire(tick))[0];
        }
        let undo = h.toasts.find(&b1(), ToastKind::Undo).unwrap();
        assert_eq!(undo.countdown, Some(2));
        assert_eq!(undo.message, "\"Visa\" will be deleted in 2 seconds. Undo?");

        for _ in 0..2 {
            h.fire(tick);
            if let Some(DeletionPhase::CountingDown { tick: Some(next), .. }) =
                h.controller.pending(&b1()).map(|p| p.phase.clone())
            {
                tick = next;
            }
        }
        h.fire(commit);
        h.controller.complete(&b1(), Ok(()), &mut h.toasts);

        assert!(h.toasts.find(&b1(), ToastKind::Undo).is_none());
        assert!(h.toasts.iter().any(|t| t.kind == ToastKind::Success));
    }
}
