use serde::de::DeserializeOwned;

use crate::capabilities::{Capabilities, HttpMethod, HttpResult, TimerOutput};
use crate::client::{self, ApiClient, ClientError, Page, PreconditionError};
use crate::event::Event;
use crate::list_store::LoadTicket;
use crate::model::{Collection, EntityKey, ListFilter, Model, StatsQueryData, STATS_QUERY};
use crate::publication::PublicationDraft;
use crate::toast::{NewToast, TimerCommand, ToastKind};
use crate::undo::UndoCommand;
use crate::view::ViewModel;
use crate::AppError;

#[derive(Default)]
pub struct App;

impl App {
    fn client<'a>(model: &'a Model, caps: &'a Capabilities) -> ApiClient<'a> {
        ApiClient::new(&model.config, &model.session, &caps.http)
    }

    fn load_list(model: &mut Model, caps: &Capabilities, collection: Collection) {
        let started = match collection {
            Collection::Boards => model.boards.begin_load(),
            Collection::Staff => model.staff.begin_load(),
            Collection::Publications => model.publications.begin_load(),
        };
        let ticket = match started {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "list load skipped");
                return;
            }
        };

        let filter = match collection {
            Collection::Boards => model.boards.filter(),
            Collection::Staff => model.staff.filter(),
            Collection::Publications => model.publications.filter(),
        };
        let request = Self::client(model, caps).fetch_list(collection, filter);
        match request {
            Ok(request) => {
                tracing::debug!(collection = %collection, ticket = ticket.0, "fetching list");
                request.send(move |result| Event::ListLoaded {
                    collection,
                    ticket,
                    result: Box::new(result),
                });
            }
            Err(e) => Self::finish_list(model, collection, ticket, Err(e)),
        }
    }

    fn finish_list(
        model: &mut Model,
        collection: Collection,
        ticket: LoadTicket,
        result: Result<HttpResult, ClientError>,
    ) {
        match collection {
            Collection::Boards => model.boards.finish_load(ticket, parse_page(result)),
            Collection::Staff => model.staff.finish_load(ticket, parse_page(result)),
            Collection::Publications => {
                model.publications.finish_load(ticket, parse_page(result));
            }
        }
    }

    fn set_filter(model: &mut Model, collection: Collection, filter: ListFilter) -> bool {
        match collection {
            Collection::Boards => model.boards.set_filter(filter),
            Collection::Staff => model.staff.set_filter(filter),
            Collection::Publications => model.publications.set_filter(filter),
        }
    }

    fn load_stats(model: &mut Model, caps: &Capabilities) {
        let Some(embassy_id) = model.session.embassy_id.clone() else {
            model.stats.error = Some(ClientError::from(PreconditionError::MissingEmbassy).into());
            return;
        };

        let variables = serde_json::json!({ "embassyId": embassy_id });
        let request = Self::client(model, caps).graphql(STATS_QUERY, variables);
        match request {
            Ok(request) => {
                model.stats.loading = true;
                model.stats.error = None;
                model.stats.requests_issued += 1;
                let epoch = model.session_epoch;
                request.send(move |result| Event::StatsLoaded {
                    epoch,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "stats request not sent");
                model.stats.error = Some(e.into());
            }
        }
    }

    /// Tells the summary that `collection` changed.
    fn propagate_refresh(&self, model: &mut Model, caps: &Capabilities, collection: Collection) {
        if let Some(event) = model.link_mut(collection).notify() {
            tracing::debug!(collection = %collection, "propagating refresh");
            self.update_inner(event, model, caps);
        }
    }

    fn apply_undo_commands(model: &mut Model, caps: &Capabilities, commands: Vec<UndoCommand>) {
        for command in commands {
            match command {
                UndoCommand::StartTimer { id, after } => {
                    caps.timer.start(id, after, Event::TimerFinished);
                }
                UndoCommand::CancelTimer(id) => caps.timer.cancel(id),
                UndoCommand::IssueDelete(target) => Self::issue_delete(model, caps, target),
            }
        }
    }

    fn issue_delete(model: &mut Model, caps: &Capabilities, target: EntityKey) {
        let request = Self::client(model, caps).delete(&target);
        match request {
            Ok(request) => {
                tracing::info!(target = %target, "sending delete");
                request.send(move |result| Event::DeleteFinished {
                    target,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                model
                    .deletions
                    .complete(&target, Err(e.into()), &mut model.toasts);
            }
        }
    }

    fn sync_toast_timers(model: &mut Model, caps: &Capabilities) {
        for command in model.toasts.take_timer_commands(&mut model.timer_ids) {
            match command {
                TimerCommand::Start { id, after } => {
                    caps.timer.start(id, after, Event::TimerFinished);
                }
                TimerCommand::Cancel(id) => caps.timer.cancel(id),
            }
        }
    }

    fn error_toast(model: &mut Model, title: &str, error: &AppError) {
        model
            .toasts
            .enqueue(NewToast::error(title, error.user_facing_message()));
    }

    fn update_inner(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        match event {
            Event::Noop => {}

            Event::Configure(config) => {
                tracing::info!(base_url = %config.base_url, "configured");
                model.deletions.set_window_secs(config.undo_window_secs);
                model.config = config;
            }

            Event::SignedIn { token, embassy_id } => {
                tracing::info!(embassy = %embassy_id, "signed in");
                model.session.token = Some(token);
                model.session.embassy_id = Some(embassy_id);

                let filter = model.initial_filter();
                for collection in Collection::ALL {
                    Self::set_filter(model, collection, filter.clone());
                    Self::load_list(model, caps, collection);
                }
                Self::load_stats(model, caps);
            }

            Event::SignedOut => {
                tracing::info!("signed out");
                model.session_epoch += 1;
                let commands = model.deletions.cancel_all(&mut model.toasts);
                Self::apply_undo_commands(model, caps, commands);
                model.toasts.clear();
                model.session = crate::model::Session::default();
                model.boards.reset();
                model.staff.reset();
                model.publications.reset();
                model.stats = crate::model::StatsState::default();
                model.draft = None;
                model.board_saving = false;
                model.board_error = None;
            }

            Event::ListFilterChanged {
                collection,
                mut filter,
            } => {
                if filter.embassy_id.is_none() {
                    filter.embassy_id = model.session.embassy_id.clone();
                }
                if Self::set_filter(model, collection, filter) {
                    Self::load_list(model, caps, collection);
                }
            }

            Event::ListRefreshRequested { collection } => {
                Self::load_list(model, caps, collection);
            }

            Event::ListLoaded {
                collection,
                ticket,
                result,
            } => {
                Self::finish_list(model, collection, ticket, Ok(*result));
            }

            Event::StatsRefreshRequested => Self::load_stats(model, caps),

            Event::StatsLoaded { epoch, result } => {
                if epoch != model.session_epoch {
                    tracing::debug!(epoch, "dropping stats from an earlier session");
                    return;
                }
                model.stats.loading = false;
                match client::parse_graphql::<StatsQueryData>(*result) {
                    Ok(data) => {
                        model.stats.summary = Some(data.embassy_stats);
                        model.stats.error = None;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stats load failed");
                        model.stats.error = Some(e.into());
                    }
                }
            }

            Event::DeleteRequested { target, label } => {
                let label = label
                    .or_else(|| model.label_of(&target))
                    .unwrap_or_else(|| target.id.clone());
                if let Err(e) = model.deletions.request(target, label, &mut model.toasts) {
                    tracing::warn!(error = %e, "delete request ignored");
                }
            }

            Event::DeleteConfirmed { target } => {
                match model
                    .deletions
                    .confirm(&target, &mut model.toasts, &mut model.timer_ids)
                {
                    Ok(commands) => Self::apply_undo_commands(model, caps, commands),
                    Err(e) => tracing::warn!(error = %e, "confirm ignored"),
                }
            }

            Event::DeleteDeclined { target } => {
                model.deletions.decline(&target, &mut model.toasts);
            }

            Event::UndoRequested { target } => {
                let commands = model.deletions.undo(&target, &mut model.toasts);
                Self::apply_undo_commands(model, caps, commands);
            }

            Event::DeleteFinished { target, result } => {
                let outcome = client::expect_success(*result).map_err(AppError::from);
                let deleted = outcome.is_ok();
                if !model.deletions.complete(&target, outcome, &mut model.toasts) {
                    // Cancelled by sign-out while the DELETE was in flight.
                    tracing::debug!(target = %target, "dropping stale delete result");
                    return;
                }
                if deleted {
                    match target.collection {
                        Collection::Boards => {
                            model.boards.remove(&target.id);
                        }
                        Collection::Staff => {
                            model.staff.remove(&target.id);
                        }
                        Collection::Publications => {
                            model.publications.remove(&target.id);
                        }
                    }
                }

                Self::load_list(model, caps, target.collection);
                if deleted {
                    self.propagate_refresh(model, caps, target.collection);
                }
            }

            Event::TimerFinished(TimerOutput::Fired(id)) => {
                if model.deletions.owns_timer(id) {
                    let commands =
                        model
                            .deletions
                            .timer_fired(id, &mut model.toasts, &mut model.timer_ids);
                    Self::apply_undo_commands(model, caps, commands);
                } else if model.toasts.expiry_fired(id).is_none() {
                    tracing::debug!(timer = %id, "ignoring stale timer");
                }
            }

            Event::TimerFinished(TimerOutput::Cleared(id)) => {
                tracing::debug!(timer = %id, "timer cleared");
            }

            Event::ToastDismissed { id } => {
                let confirm_target = model
                    .toasts
                    .get(id)
                    .filter(|toast| toast.kind == ToastKind::Confirm)
                    .and_then(|toast| toast.target.clone());
                match confirm_target {
                    Some(target) => {
                        model.deletions.decline(&target, &mut model.toasts);
                    }
                    None => {
                        model.toasts.dismiss(id);
                    }
                }
            }

            Event::BoardSaveRequested(mut input) => {
                if let Err(e) = input.validate() {
                    model.board_error = Some(e.into());
                    return;
                }
                if input.embassy_id.is_none() {
                    input.embassy_id = model.session.embassy_id.clone();
                }

                let (endpoint, method) = match &input.id {
                    Some(id) => (format!("{}/{id}", Collection::Boards.path()), HttpMethod::Put),
                    None => (Collection::Boards.path().to_string(), HttpMethod::Post),
                };
                let request = Self::client(model, caps).mutate(&endpoint, method, Some(&input));
                match request {
                    Ok(request) => {
                        model.board_saving = true;
                        model.board_error = None;
                        request.send(|result| Event::BoardSaved {
                            result: Box::new(result),
                        });
                    }
                    Err(e) => model.board_error = Some(e.into()),
                }
            }

            Event::BoardSaved { result } => {
                model.board_saving = false;
                match client::expect_success(*result) {
                    Ok(()) => {
                        model.board_error = None;
                        model
                            .toasts
                            .enqueue(NewToast::success("Board saved", "Your changes were saved."));
                        Self::load_list(model, caps, Collection::Boards);
                        self.propagate_refresh(model, caps, Collection::Boards);
                    }
                    Err(e) => {
                        let error = AppError::from(e);
                        Self::error_toast(model, "Could not save board", &error);
                        model.board_error = Some(error);
                    }
                }
            }

            Event::PublicationDraftStarted => {
                model.draft = Some(PublicationDraft::default());
            }

            Event::PublicationFieldChanged { field, value } => {
                if let Some(draft) = model.draft.as_mut() {
                    draft.set(field, value);
                }
            }

            Event::PublicationStepAdvanced => {
                if let Some(draft) = model.draft.as_mut() {
                    if let Err(errors) = draft.advance() {
                        tracing::debug!(count = errors.len(), "publication step invalid");
                    }
                }
            }

            Event::PublicationStepReverted => {
                if let Some(draft) = model.draft.as_mut() {
                    draft.back();
                }
            }

            Event::PublicationSubmitted => {
                let Some(draft) = model.draft.as_ref() else {
                    return;
                };
                if draft.submitting {
                    return;
                }
                let payload = match draft.payload(model.session.embassy_id.clone()) {
                    Ok(payload) => payload,
                    Err(errors) => {
                        if let Some(draft) = model.draft.as_mut() {
                            draft.errors = errors;
                        }
                        return;
                    }
                };

                let request = Self::client(model, caps).mutate(
                    Collection::Publications.path(),
                    HttpMethod::Post,
                    Some(&payload),
                );
                match request {
                    Ok(request) => {
                        if let Some(draft) = model.draft.as_mut() {
                            draft.submitting = true;
                        }
                        request.send(|result| Event::PublicationSaved {
                            result: Box::new(result),
                        });
                    }
                    Err(e) => {
                        Self::error_toast(model, "Could not publish", &AppError::from(e));
                    }
                }
            }

            Event::PublicationSaved { result } => match client::expect_success(*result) {
                Ok(()) => {
                    model.draft = None;
                    model.toasts.enqueue(NewToast::success(
                        "Publication created",
                        "The publication was saved as a draft.",
                    ));
                    Self::load_list(model, caps, Collection::Publications);
                    self.propagate_refresh(model, caps, Collection::Publications);
                }
                Err(e) => {
                    if let Some(draft) = model.draft.as_mut() {
                        draft.submitting = false;
                    }
                    Self::error_toast(model, "Could not publish", &AppError::from(e));
                }
            },

            Event::PublicationDraftDiscarded => {
                model.draft = None;
            }
        }
    }
}

fn parse_page<T: DeserializeOwned>(
    result: Result<HttpResult, ClientError>,
) -> Result<Page<T>, AppError> {
    result
        .and_then(client::parse_collection)
        .map_err(AppError::from)
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        tracing::debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        self.update_inner(event, model, caps);
        Self::sync_toast_timers(model, caps);
        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from(model)
    }
}
