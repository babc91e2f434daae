use serde::{Deserialize, Serialize};

use crate::list_store::ListStore;
use crate::model::{Collection, EntityKey, ListFilter, ListItem, Model, Stats};
use crate::publication::{FieldError, PublicationDraft, PublicationField, PublicationStep};
use crate::toast::{ToastEntry, ToastKind};
use crate::undo::{DeleteUndoController, DeletionPhase};
use crate::{AppError, ErrorKind};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: matches!(
                e.kind,
                ErrorKind::Network | ErrorKind::Internal | ErrorKind::RateLimited | ErrorKind::Unknown
            ),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastView {
    pub id: String,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub countdown: Option<u32>,
    pub target: Option<EntityKey>,
}

impl From<&ToastEntry> for ToastView {
    fn from(t: &ToastEntry) -> Self {
        Self {
            id: t.id.to_string(),
            kind: t.kind,
            title: t.title.clone(),
            message: t.message.clone(),
            countdown: t.countdown,
            target: t.target.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RowState {
    #[default]
    Idle,
    Confirming,
    CountingDown {
        remaining: u32,
    },
    Deleting,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowView {
    pub id: Option<String>,
    pub label: String,
    pub state: RowState,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListView {
    pub collection: Collection,
    pub rows: Vec<RowView>,
    pub loading: bool,
    pub error: Option<UserFacingError>,
    pub filter: ListFilter,
    pub total: Option<u64>,
}

impl ListView {
    pub fn build<T: ListItem>(
        collection: Collection,
        store: &ListStore<T>,
        deletions: &DeleteUndoController,
    ) -> Self {
        let rows = store
            .items()
            .iter()
            .map(|item| {
                let state = item
                    .key()
                    .and_then(|id| deletions.pending(&EntityKey::new(collection, id)))
                    .map_or(RowState::Idle, |pending| match pending.phase {
                        DeletionPhase::Confirming { .. } => RowState::Confirming,
                        DeletionPhase::CountingDown { remaining, .. } => {
                            RowState::CountingDown { remaining }
                        }
                        DeletionPhase::Committing => RowState::Deleting,
                    });
                RowView {
                    id: item.key().map(str::to_string),
                    label: item.label(),
                    state,
                }
            })
            .collect();

        Self {
            collection,
            rows,
            loading: store.is_loading(),
            error: store.error().map(UserFacingError::from),
            filter: store.filter().clone(),
            total: store.total(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsView {
    pub summary: Option<Stats>,
    pub loading: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldErrorView {
    pub field: PublicationField,
    pub message: String,
}

impl From<&FieldError> for FieldErrorView {
    fn from(e: &FieldError) -> Self {
        Self {
            field: e.field(),
            message: e.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftView {
    pub step: PublicationStep,
    pub step_number: u8,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub body: String,
    pub errors: Vec<FieldErrorView>,
    pub can_go_back: bool,
    pub can_submit: bool,
    pub submitting: bool,
}

impl From<&PublicationDraft> for DraftView {
    fn from(d: &PublicationDraft) -> Self {
        Self {
            step: d.step,
            step_number: d.step.number(),
            title: d.title.clone(),
            category: d.category.clone(),
            summary: d.summary.clone(),
            body: d.body.clone(),
            errors: d.errors.iter().map(FieldErrorView::from).collect(),
            can_go_back: d.step != PublicationStep::Details,
            can_submit: d.step == PublicationStep::Review && !d.submitting,
            submitting: d.submitting,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardFormView {
    pub saving: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub is_authenticated: bool,
    pub embassy_id: Option<String>,
    pub boards: ListView,
    pub staff: ListView,
    pub publications: ListView,
    pub stats: StatsView,
    pub toasts: Vec<ToastView>,
    pub draft: Option<DraftView>,
    pub board_form: BoardFormView,
}

impl From<&Model> for ViewModel {
    fn from(model: &Model) -> Self {
        Self {
            is_authenticated: model.session.is_authenticated(),
            embassy_id: model.session.embassy_id.as_ref().map(ToString::to_string),
            boards: ListView::build(Collection::Boards, &model.boards, &model.deletions),
            staff: ListView::build(Collection::Staff, &model.staff, &model.deletions),
            publications: ListView::build(
                Collection::Publications,
                &model.publications,
                &model.deletions,
            ),
            stats: StatsView {
                summary: model.stats.summary.clone(),
                loading: model.stats.loading,
                error: model.stats.error.as_ref().map(UserFacingError::from),
            },
            toasts: model.toasts.iter().map(ToastView::from).collect(),
            draft: model.draft.as_ref().map(DraftView::from),
            board_form: BoardFormView {
                saving: model.board_saving,
                error: model.board_error.as_ref().map(UserFacingError::from),
            },
        }
    }
}
