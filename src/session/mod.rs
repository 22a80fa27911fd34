//! Application controller: holds the per-session state (page, working copy,
//! editor name, access gate) and turns user actions into store calls.
//! Every failure comes back as a notification; the session stays usable.

pub mod views;

#[cfg(test)]
mod tests;

use crate::common::errors::{BusinessError, BusinessResult};
use crate::common::models::Notification;
use crate::config::Config;
use crate::samples::models::{Sample, SampleDraft, SampleField, SampleImage};
use crate::store::Store;
use crate::store::export::ImportDocument;
use crate::utils::form::fill_form;
use crate::utils::timing::Debounce;
use crate::utils::{generate_id, validate_password};
use crate::{business_rule_violation, not_found, storage_failure, validation_error};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use views::{SettingsSummary, View};

const USAGE_REFRESH_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Home,
    Detail,
    Edit,
    History,
    Settings,
}

/// Transient copy of the sample being viewed or edited. `id` is `None`
/// for a sample that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingCopy {
    pub id: Option<i32>,
    pub draft: SampleDraft,
}

impl WorkingCopy {
    fn existing(sample: &Sample) -> Self {
        Self {
            id: Some(sample.id),
            draft: sample.to_draft(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub page: Page,
    pub current: Option<WorkingCopy>,
    pub editor_name: Option<String>,
    pub authenticated: bool,
}

/// User intents accepted by [`Session::handle`]
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Login(String),
    Home,
    Search(String),
    Show(i32),
    New,
    /// Edit the given sample, or the one currently shown
    Edit(Option<i32>),
    SetField(SampleField, Option<String>),
    SetProperty(String, String),
    RemoveProperty(String),
    AttachImage(PathBuf),
    /// Zero-based position in the working copy's image list
    DetachImage(usize),
    Save,
    Cancel,
    /// Delete the given sample, or the one currently shown
    Delete(Option<i32>),
    History(Option<String>),
    SetEditor(String),
    /// Target file or directory; defaults to the dated backup name
    Export(Option<PathBuf>),
    Import(PathBuf),
    Settings,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login(_) => "login",
            Action::Home => "list",
            Action::Search(_) => "search",
            Action::Show(_) => "show",
            Action::New => "new",
            Action::Edit(_) => "edit",
            Action::SetField(..) => "set",
            Action::SetProperty(..) => "prop",
            Action::RemoveProperty(_) => "unprop",
            Action::AttachImage(_) => "attach",
            Action::DetachImage(_) => "detach",
            Action::Save => "save",
            Action::Cancel => "cancel",
            Action::Delete(_) => "delete",
            Action::History(_) => "history",
            Action::SetEditor(_) => "editor",
            Action::Export(_) => "export",
            Action::Import(_) => "import",
            Action::Settings => "settings",
        }
    }
}

/// Result of one action: the view to show and an optional one-shot message
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub view: View,
    pub notification: Option<Notification>,
}

impl Outcome {
    fn view(view: View) -> Self {
        Self {
            view,
            notification: None,
        }
    }

    fn with(view: View, notification: Notification) -> Self {
        Self {
            view,
            notification: Some(notification),
        }
    }
}

/// Marks a mutating operation as running; cleared on drop
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> BusinessResult<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(business_rule_violation!(
                "single_operation",
                "another operation is still running"
            ));
        }
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    id: String,
    store: Arc<Store>,
    config: Config,
    state: SessionState,
    busy: Arc<AtomicBool>,
    usage: Arc<Mutex<Option<u64>>>,
    usage_refresh: Debounce,
}

impl Session {
    pub fn new(store: Arc<Store>, config: Config) -> Self {
        let id = generate_id();
        debug!(session = %id, "Session created");
        Self {
            id,
            store,
            state: SessionState {
                page: Page::Login,
                current: None,
                editor_name: config.default_editor.clone(),
                authenticated: false,
            },
            config,
            busy: Arc::new(AtomicBool::new(false)),
            usage: Arc::new(Mutex::new(None)),
            usage_refresh: Debounce::new(USAGE_REFRESH_DELAY),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Shared flag that is set while a save, delete or import runs
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.busy)
    }

    /// Pass the access gate
    ///
    /// # Errors
    /// `Forbidden` when the password does not match.
    pub fn login(&mut self, password: &str) -> BusinessResult<()> {
        if !validate_password(password, &self.config.access_password) {
            warn!(session = %self.id, "Rejected login attempt");
            return Err(BusinessError::Forbidden {
                action: "open".to_string(),
                resource: self.config.app_name.clone(),
            });
        }
        self.state.authenticated = true;
        self.state.page = Page::Home;
        info!(session = %self.id, "Session unlocked");
        Ok(())
    }

    /// Run one action. Errors are turned into an error notification and
    /// leave the current view in place.
    pub async fn handle(&mut self, action: Action) -> Outcome {
        let name = action.name();
        match self.dispatch(action).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(session = %self.id, "{name} failed: {err}");
                let view = if matches!(err, BusinessError::Forbidden { .. }) {
                    View::Login
                } else {
                    View::Unchanged
                };
                Outcome::with(view, Notification::from(err))
            }
        }
    }

    async fn dispatch(&mut self, action: Action) -> BusinessResult<Outcome> {
        if !matches!(action, Action::Login(_)) {
            self.require_authenticated(action.name())?;
        }

        match action {
            Action::Login(password) => {
                self.login(&password)?;
                let view = self.show_list(None).await?;
                Ok(Outcome::with(view, Notification::success("Welcome")))
            }
            Action::Home => Ok(Outcome::view(self.show_list(None).await?)),
            Action::Search(query) => Ok(Outcome::view(self.show_list(Some(query)).await?)),
            Action::Show(id) => Ok(Outcome::view(self.show_detail(id).await?)),
            Action::New => {
                self.state.current = Some(WorkingCopy {
                    id: None,
                    draft: SampleDraft::default(),
                });
                Ok(Outcome::view(self.show_edit()?))
            }
            Action::Edit(id) => self.start_edit(id).await,
            Action::SetField(field, value) => {
                let copy = self.editing()?;
                let value = value
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty());
                field.set(&mut copy.draft, value);
                Ok(Outcome::view(self.show_edit()?))
            }
            Action::SetProperty(key, value) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(validation_error!("property", "property name must not be empty"));
                }
                self.editing()?.draft.properties.insert(key, value);
                Ok(Outcome::view(self.show_edit()?))
            }
            Action::RemoveProperty(key) => {
                let removed = self.editing()?.draft.properties.remove(key.trim());
                if removed.is_none() {
                    return Err(not_found!("Property", key.trim()));
                }
                Ok(Outcome::view(self.show_edit()?))
            }
            Action::AttachImage(path) => self.attach_image(&path).await,
            Action::DetachImage(index) => {
                let images = &mut self.editing()?.draft.images;
                if index >= images.len() {
                    return Err(validation_error!(
                        "image",
                        format!("there is no image #{}", index + 1)
                    ));
                }
                let removed = images.remove(index);
                let view = self.show_edit()?;
                Ok(Outcome::with(
                    view,
                    Notification::info(format!("Removed {}", removed.name)),
                ))
            }
            Action::Save => self.save().await,
            Action::Cancel => self.cancel().await,
            Action::Delete(id) => self.delete(id).await,
            Action::History(query) => {
                self.leave(Page::History);
                let records = match query.as_deref() {
                    Some(query) => self.store.search_history(query).await?,
                    None => self.store.get_all_history().await?,
                };
                Ok(Outcome::view(View::History { query, records }))
            }
            Action::SetEditor(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(validation_error!("editor", "editor name must not be empty"));
                }
                self.state.editor_name = Some(name.to_string());
                Ok(Outcome::with(
                    View::Unchanged,
                    Notification::info(format!("Editing as {name}")),
                ))
            }
            Action::Export(target) => self.export(target).await,
            Action::Import(path) => self.import(&path).await,
            Action::Settings => {
                self.leave(Page::Settings);
                Ok(Outcome::view(View::Settings(self.settings().await?)))
            }
        }
    }

    fn require_authenticated(&self, action: &str) -> BusinessResult<()> {
        if self.state.authenticated {
            Ok(())
        } else {
            Err(BusinessError::Forbidden {
                action: action.to_string(),
                resource: self.config.app_name.clone(),
            })
        }
    }

    fn require_editor(&self) -> BusinessResult<String> {
        self.state
            .editor_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                validation_error!("editor", "set an editor name before changing data")
            })
    }

    fn editing(&mut self) -> BusinessResult<&mut WorkingCopy> {
        match (self.state.page, self.state.current.as_mut()) {
            (Page::Edit, Some(copy)) => Ok(copy),
            _ => Err(business_rule_violation!(
                "editing",
                "no sample is being edited"
            )),
        }
    }

    /// Navigate to a page that has no current sample
    fn leave(&mut self, page: Page) {
        self.state.page = page;
        self.state.current = None;
    }

    async fn show_list(&mut self, query: Option<String>) -> BusinessResult<View> {
        self.leave(Page::Home);
        let query = query.filter(|query| !query.trim().is_empty());
        let samples = match query.as_deref() {
            Some(query) => self.store.search_samples(query).await?,
            None => self.store.get_all_samples().await?,
        };
        Ok(View::SampleList { query, samples })
    }

    async fn show_detail(&mut self, id: i32) -> BusinessResult<View> {
        let sample = self
            .store
            .get_sample_by_id(id)
            .await?
            .ok_or_else(|| not_found!("Sample", id))?;
        let history = self.store.get_sample_history(id).await?;

        self.state.page = Page::Detail;
        self.state.current = Some(WorkingCopy::existing(&sample));
        Ok(View::SampleDetail { sample, history })
    }

    fn show_edit(&mut self) -> BusinessResult<View> {
        self.state.page = Page::Edit;
        let copy = self.editing()?;
        Ok(View::Edit {
            id: copy.id,
            form: fill_form(&copy.draft),
            properties: copy.draft.properties.clone(),
            images: copy.draft.images.clone(),
        })
    }

    async fn start_edit(&mut self, id: Option<i32>) -> BusinessResult<Outcome> {
        let id = id
            .or_else(|| self.state.current.as_ref().and_then(|copy| copy.id))
            .ok_or_else(|| business_rule_violation!("editing", "no sample selected"))?;

        // Always start from the stored record
        let sample = self
            .store
            .get_sample_by_id(id)
            .await?
            .ok_or_else(|| not_found!("Sample", id))?;
        self.state.current = Some(WorkingCopy::existing(&sample));
        Ok(Outcome::view(self.show_edit()?))
    }

    async fn attach_image(&mut self, path: &Path) -> BusinessResult<Outcome> {
        self.editing()?;
        let image = SampleImage::from_path(path).await.map_err(|err| {
            validation_error!("image", format!("cannot read {}: {err}", path.display()))
        })?;
        let name = image.name.clone();
        self.editing()?.draft.images.push(image);
        debug!(session = %self.id, "Attached image {name}");

        let view = self.show_edit()?;
        Ok(Outcome::with(view, Notification::info(format!("Attached {name}"))))
    }

    async fn save(&mut self) -> BusinessResult<Outcome> {
        let editor = self.require_editor()?;
        let copy = self.editing()?.clone();
        if copy
            .draft
            .batch
            .as_deref()
            .is_none_or(|batch| batch.trim().is_empty())
        {
            return Err(validation_error!("batch", "batch is required"));
        }

        let _guard = InFlight::acquire(&self.busy)?;
        let (id, message) = match copy.id {
            None => {
                let id = self.store.add_sample(copy.draft, &editor).await?;
                (id, format!("Sample #{id} created"))
            }
            Some(id) => {
                let stored = self
                    .store
                    .get_sample_by_id(id)
                    .await?
                    .ok_or_else(|| not_found!("Sample", id))?;
                let updates = copy.draft.changes_from(&stored);
                if updates.is_empty() {
                    let view = self.show_detail(id).await?;
                    return Ok(Outcome::with(view, Notification::info("Nothing to save")));
                }
                self.store.update_sample(id, updates, &editor).await?;
                (id, format!("Sample #{id} saved"))
            }
        };

        self.schedule_usage_refresh();
        let view = self.show_detail(id).await?;
        Ok(Outcome::with(view, Notification::success(message)))
    }

    async fn cancel(&mut self) -> BusinessResult<Outcome> {
        let id = self.editing()?.id;
        let view = match id {
            Some(id) => self.show_detail(id).await?,
            None => self.show_list(None).await?,
        };
        Ok(Outcome::with(view, Notification::info("Changes discarded")))
    }

    async fn delete(&mut self, id: Option<i32>) -> BusinessResult<Outcome> {
        let id = id
            .or_else(|| self.state.current.as_ref().and_then(|copy| copy.id))
            .ok_or_else(|| business_rule_violation!("delete", "no sample selected"))?;
        let editor = self.require_editor()?;

        let _guard = InFlight::acquire(&self.busy)?;
        self.store.delete_sample(id, &editor).await?;

        self.schedule_usage_refresh();
        let view = self.show_list(None).await?;
        Ok(Outcome::with(
            view,
            Notification::success(format!("Sample #{id} deleted")),
        ))
    }

    async fn export(&mut self, target: Option<PathBuf>) -> BusinessResult<Outcome> {
        let document = self.store.export_data().await?;
        let path = match target {
            Some(path) if path.is_dir() => path.join(document.file_name()),
            Some(path) => path,
            None => PathBuf::from(document.file_name()),
        };

        let text = serde_json::to_string_pretty(&document)
            .map_err(|err| storage_failure!("export_data", err))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|err| storage_failure!("export_data", format!("{}: {err}", path.display())))?;

        info!(
            session = %self.id,
            "Exported {} samples and {} history entries to {}",
            document.samples.len(),
            document.history.len(),
            path.display()
        );
        Ok(Outcome::with(
            View::Unchanged,
            Notification::success(format!(
                "Exported {} samples and {} history entries to {}",
                document.samples.len(),
                document.history.len(),
                path.display()
            )),
        ))
    }

    async fn import(&mut self, path: &Path) -> BusinessResult<Outcome> {
        let editor = self.require_editor()?;
        let _guard = InFlight::acquire(&self.busy)?;

        let text = tokio::fs::read_to_string(path).await.map_err(|err| {
            validation_error!("file", format!("cannot read {}: {err}", path.display()))
        })?;
        let document = ImportDocument::from_json(&text)?;
        let summary = self.store.import_data(document, &editor).await?;

        self.schedule_usage_refresh();
        let view = self.show_list(None).await?;
        Ok(Outcome::with(
            view,
            Notification::success(format!(
                "Imported {} samples and {} history entries",
                summary.sample_count, summary.history_count
            )),
        ))
    }

    async fn settings(&mut self) -> BusinessResult<SettingsSummary> {
        let cached = *self.usage.lock().await;
        let storage_usage = match cached {
            Some(bytes) if !self.usage_refresh.is_pending() => bytes,
            _ => {
                self.usage_refresh.cancel();
                let bytes = self.store.get_storage_usage().await?;
                *self.usage.lock().await = Some(bytes);
                bytes
            }
        };
        let (sample_count, history_count) = self.store.counts().await?;

        Ok(SettingsSummary {
            storage_usage,
            sample_count,
            history_count,
            schema_version: self.store.schema_version().await?,
            editor: self.state.editor_name.clone(),
        })
    }

    /// Recompute the storage figure once writes have settled
    fn schedule_usage_refresh(&mut self) {
        let store = Arc::clone(&self.store);
        let usage = Arc::clone(&self.usage);
        self.usage_refresh.call(async move {
            match store.get_storage_usage().await {
                Ok(bytes) => {
                    *usage.lock().await = Some(bytes);
                    debug!("Storage usage refreshed: {bytes} bytes");
                }
                Err(err) => warn!("Storage usage refresh failed: {err}"),
            }
        });
    }
}
