use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::capabilities::TimerIdSource;
use crate::event::Event;
use crate::list_store::ListStore;
use crate::publication::PublicationDraft;
use crate::refresh::RefreshLink;
use crate::toast::ToastQueue;
use crate::undo::DeleteUndoController;
use crate::{
    AppError, DEFAULT_API_BASE_URL, DEFAULT_GRAPHQL_PATH, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    UNDO_WINDOW_SECS,
};

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(EmbassyId);
typed_id!(BoardId);
typed_id!(StaffId);
typed_id!(PublicationId);

// --- Collections and entity keys ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Boards,
    Staff,
    Publications,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Boards, Self::Staff, Self::Publications];

    /// Path segment of the REST resource, relative to the API base URL.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Boards => "boards",
            Self::Staff => "staff",
            Self::Publications => "publications",
        }
    }

    pub const fn noun(self) -> &'static str {
        match self {
            Self::Boards => "Board",
            Self::Staff => "Staff member",
            Self::Publications => "Publication",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Identifies one deletable entity across all collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub collection: Collection,
    pub id: String,
}

impl EntityKey {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }

    pub fn board(id: impl Into<String>) -> Self {
        Self::new(Collection::Boards, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection.path(), self.id)
    }
}

/// An entity shown in a collection view.
pub trait ListItem {
    /// Server identifier; absent until the entity has been persisted.
    fn key(&self) -> Option<&str>;

    /// Human-readable name used in list rows and toasts.
    fn label(&self) -> String;
}

// --- Entities ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoardStatus {
    #[default]
    Active,
    Inactive,
    Archived,
    #[serde(other)]
    Unknown,
}

impl BoardStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Archived => "archived",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default, alias = "_id")]
    pub id: Option<BoardId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: BoardStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ListItem for Board {
    fn key(&self) -> Option<&str> {
        self.id.as_ref().map(BoardId::as_str)
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    #[serde(default, alias = "_id")]
    pub id: Option<StaffId>,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ListItem for StaffMember {
    fn key(&self) -> Option<&str> {
        self.id.as_ref().map(StaffId::as_str)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    #[serde(default, alias = "_id")]
    pub id: Option<PublicationId>,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ListItem for Publication {
    fn key(&self) -> Option<&str> {
        self.id.as_ref().map(PublicationId::as_str)
    }

    fn label(&self) -> String {
        self.title.clone()
    }
}

fn default_true() -> bool {
    true
}

/// Aggregate counters shown on the dashboard summary.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub total_boards: u64,
    #[serde(default)]
    pub active_boards: u64,
    #[serde(default)]
    pub total_staff: u64,
    #[serde(default)]
    pub total_publications: u64,
    #[serde(default)]
    pub published_publications: u64,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsQueryData {
    pub embassy_stats: Stats,
}

pub const STATS_QUERY: &str = "query EmbassyStats($embassyId: ID!) { \
embassyStats(embassyId: $embassyId) { totalBoards activeBoards totalStaff totalPublications publishedPublications } }";

// --- Filters ---

/// Inputs a list depends on. Any change of value triggers a re-fetch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListFilter {
    pub embassy_id: Option<EmbassyId>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            embassy_id: None,
            status: None,
            category: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListFilter {
    #[must_use]
    pub fn for_embassy(embassy_id: EmbassyId) -> Self {
        Self {
            embassy_id: Some(embassy_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Pages are 1-based and the limit is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.status = self.status.filter(|s| !s.trim().is_empty());
        self.category = self.category.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(embassy_id) = &self.embassy_id {
            pairs.push(("embassyId", embassy_id.0.clone()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

// --- Board editing ---

pub const MAX_BOARD_TITLE_LENGTH: usize = 120;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoardInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BoardId>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub status: BoardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embassy_id: Option<EmbassyId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardInputError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Title must be at most {max} characters")]
    TitleTooLong { max: usize },
}

impl From<BoardInputError> for AppError {
    fn from(e: BoardInputError) -> Self {
        AppError::new(crate::ErrorKind::Validation, e.to_string())
    }
}

impl BoardInput {
    pub fn validate(&self) -> Result<(), BoardInputError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BoardInputError::MissingTitle);
        }
        if title.chars().count() > MAX_BOARD_TITLE_LENGTH {
            return Err(BoardInputError::TitleTooLong {
                max: MAX_BOARD_TITLE_LENGTH,
            });
        }
        Ok(())
    }
}

// --- Session and configuration ---

/// Credentials held in memory for the page session; persisting them is the
/// shell's job.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub embassy_id: Option<EmbassyId>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("embassy_id", &self.embassy_id)
            .finish()
    }
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub graphql_path: String,
    pub undo_window_secs: u32,
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            graphql_path: DEFAULT_GRAPHQL_PATH.to_string(),
            undo_window_secs: UNDO_WINDOW_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// --- Summary view state ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsState {
    pub summary: Option<Stats>,
    pub loading: bool,
    pub error: Option<AppError>,
    /// Number of stats fetches issued this session.
    pub requests_issued: u64,
}

// --- Model ---

#[derive(Debug)]
pub struct Model {
    pub config: ApiConfig,
    pub session: Session,
    pub boards: ListStore<Board>,
    pub staff: ListStore<StaffMember>,
    pub publications: ListStore<Publication>,
    pub stats: StatsState,
    /// Bumped on sign-out. Stats responses tagged with an older epoch are
    /// dropped.
    pub session_epoch: u64,
    pub toasts: ToastQueue,
    pub deletions: DeleteUndoController,
    pub timer_ids: TimerIdSource,
    pub draft: Option<PublicationDraft>,
    pub board_saving: bool,
    pub board_error: Option<AppError>,
    pub boards_link: RefreshLink<Event>,
    pub staff_link: RefreshLink<Event>,
    pub publications_link: RefreshLink<Event>,
}

impl Default for Model {
    fn default() -> Self {
        let config = ApiConfig::default();
        Self {
            deletions: DeleteUndoController::new(config.undo_window_secs),
            config,
            session: Session::default(),
            boards: ListStore::default(),
            staff: ListStore::default(),
            publications: ListStore::default(),
            stats: StatsState::default(),
            session_epoch: 0,
            toasts: ToastQueue::default(),
            timer_ids: TimerIdSource::default(),
            draft: None,
            board_saving: false,
            board_error: None,
            boards_link: RefreshLink::connected(Event::stats_refresh),
            staff_link: RefreshLink::connected(Event::stats_refresh),
            publications_link: RefreshLink::connected(Event::stats_refresh),
        }
    }
}

impl Model {
    pub fn link_mut(&mut self, collection: Collection) -> &mut RefreshLink<Event> {
        match collection {
            Collection::Boards => &mut self.boards_link,
            Collection::Staff => &mut self.staff_link,
            Collection::Publications => &mut self.publications_link,
        }
    }

    /// The filter a list should use right after sign-in.
    pub fn initial_filter(&self) -> ListFilter {
        ListFilter {
            embassy_id: self.session.embassy_id.clone(),
            limit: self.config.page_size,
            ..ListFilter::default()
        }
        .normalized()
    }

    /// Display label of an entity currently loaded in its list.
    pub fn label_of(&self, key: &EntityKey) -> Option<String> {
        match key.collection {
            Collection::Boards => self.boards.find(&key.id).map(ListItem::label),
            Collection::Staff => self.staff.find(&key.id).map(ListItem::label),
            Collection::Publications => self.publications.find(&key.id).map(ListItem::label),
        }
    }
}
