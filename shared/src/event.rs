use serde::{Deserialize, Serialize};

use crate::capabilities::{HttpResult, TimerOutput};
use crate::list_store::LoadTicket;
use crate::model::{ApiConfig, BoardInput, Collection, EmbassyId, EntityKey, ListFilter};
use crate::publication::PublicationField;
use crate::toast::ToastId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Event {
    #[default]
    Noop,

    Configure(ApiConfig),

    SignedIn {
        token: String,
        embassy_id: EmbassyId,
    },
    SignedOut,

    // Lists
    ListFilterChanged {
        collection: Collection,
        filter: ListFilter,
    },
    ListRefreshRequested {
        collection: Collection,
    },
    ListLoaded {
        collection: Collection,
        ticket: LoadTicket,
        result: Box<HttpResult>,
    },

    // Dashboard summary
    StatsRefreshRequested,
    StatsLoaded {
        epoch: u64,
        result: Box<HttpResult>,
    },

    // Delete with undo
    DeleteRequested {
        target: EntityKey,
        label: Option<String>,
    },
    DeleteConfirmed {
        target: EntityKey,
    },
    DeleteDeclined {
        target: EntityKey,
    },
    UndoRequested {
        target: EntityKey,
    },
    DeleteFinished {
        target: EntityKey,
        result: Box<HttpResult>,
    },

    TimerFinished(TimerOutput),

    ToastDismissed {
        id: ToastId,
    },

    // Board editing
    BoardSaveRequested(BoardInput),
    BoardSaved {
        result: Box<HttpResult>,
    },

    // Publication authoring
    PublicationDraftStarted,
    PublicationFieldChanged {
        field: PublicationField,
        value: String,
    },
    PublicationStepAdvanced,
    PublicationStepReverted,
    PublicationSubmitted,
    PublicationSaved {
        result: Box<HttpResult>,
    },
    PublicationDraftDiscarded,
}

impl Event {
    /// Installed as the refresh callback of every collection view.
    pub fn stats_refresh() -> Event {
        Event::StatsRefreshRequested
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::SignedIn { .. } => "signed_in",
            Self::SignedOut => "signed_out",
            Self::ListFilterChanged { .. } => "list_filter_changed",
            Self::ListRefreshRequested { .. } => "list_refresh_requested",
            Self::ListLoaded { .. } => "list_loaded",
            Self::StatsRefreshRequested => "stats_refresh_requested",
            Self::StatsLoaded { .. } => "stats_loaded",
            Self::DeleteRequested { .. } => "delete_requested",
            Self::DeleteConfirmed { .. } => "delete_confirmed",
            Self::DeleteDeclined { .. } => "delete_declined",
            Self::UndoRequested { .. } => "undo_requested",
            Self::DeleteFinished { .. } => "delete_finished",
            Self::TimerFinished(_) => "timer_finished",
            Self::ToastDismissed { .. } => "toast_dismissed",
            Self::BoardSaveRequested(_) => "board_save_requested",
            Self::BoardSaved { .. } => "board_saved",
            Self::PublicationDraftStarted => "publication_draft_started",
            Self::PublicationFieldChanged { .. } => "publication_field_changed",
            Self::PublicationStepAdvanced => "publication_step_advanced",
            Self::PublicationStepReverted => "publication_step_reverted",
            Self::PublicationSubmitted => "publication_submitted",
            Self::PublicationSaved { .. } => "publication_saved",
            Self::PublicationDraftDiscarded => "publication_draft_discarded",
        }
    }

    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::SignedIn { .. }
                | Self::SignedOut
                | Self::ListFilterChanged { .. }
                | Self::ListRefreshRequested { .. }
                | Self::StatsRefreshRequested
                | Self::DeleteRequested { .. }
                | Self::DeleteConfirmed { .. }
                | Self::DeleteDeclined { .. }
                | Self::UndoRequested { .. }
                | Self::ToastDismissed { .. }
                | Self::BoardSaveRequested(_)
                | Self::PublicationDraftStarted
                | Self::PublicationFieldChanged { .. }
                | Self::PublicationStepAdvanced
                | Self::PublicationStepReverted
                | Self::PublicationSubmitted
                | Self::PublicationDraftDiscarded
        )
    }
}
