//! Add/edit/photo dialog state machine.
//!
//! # Responsibility
//! - Hold the transient draft while an add/edit dialog is open.
//! - Route commits and photo changes to the store.
//!
//! # Invariants
//! - Drafts never touch the store before commit; cancel discards them.
//! - A successful commit always returns to `Idle`.
//! - Photo attach/detach hit the store immediately and refresh the bound
//!   record copy.
//! - Failed operations leave the state unchanged.

use crate::model::obstacle::{Obstacle, ObstacleDraft, ObstacleId};
use crate::repo::kv_repo::KeyValueStore;
use crate::service::attachment::{
    is_photo_uri, resolve, AttachmentResolver, PhotoSource, ResolvedPhoto, ResolverError,
};
use crate::service::obstacle_store::{ObstacleStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type FlowResult<T> = Result<T, FlowError>;

/// Dialog state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FlowState {
    #[default]
    Idle,
    AddDraft(ObstacleDraft),
    EditDraft {
        id: ObstacleId,
        draft: ObstacleDraft,
    },
    /// Photo view bound to a copy of one record.
    PhotoView(Obstacle),
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AddDraft(_) => "add_draft",
            Self::EditDraft { .. } => "edit_draft",
            Self::PhotoView(_) => "photo_view",
        }
    }
}

/// Result of an add-photo request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    /// Photo stored; carries the refreshed record.
    Attached(Obstacle),
    /// User or picker cancelled; nothing changed.
    Cancelled,
    /// Add dialog has no record yet; the picker was not opened.
    NoTarget,
}

/// Flow errors.
#[derive(Debug)]
pub enum FlowError {
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    ObstacleNotFound(ObstacleId),
    PermissionDenied,
    Resolver(ResolverError),
    InvalidPhotoUri(String),
    Store(StoreError),
}

impl Display for FlowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { state, action } => {
                write!(f, "cannot {action} while in state {state}")
            }
            Self::ObstacleNotFound(id) => write!(f, "obstacle not found: {id}"),
            Self::PermissionDenied => write!(f, "camera permission denied"),
            Self::Resolver(err) => write!(f, "{err}"),
            Self::InvalidPhotoUri(value) => write!(f, "picker returned an invalid uri: `{value}`"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FlowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolver(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ResolverError> for FlowError {
    fn from(value: ResolverError) -> Self {
        match value {
            ResolverError::PermissionDenied => Self::PermissionDenied,
            other => Self::Resolver(other),
        }
    }
}

/// Dialog state machine. Owns no store; callers pass the one store they
/// constructed at startup.
#[derive(Debug, Clone, Default)]
pub struct ObstacleFlow {
    state: FlowState,
}

impl ObstacleFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, FlowState::Idle)
    }

    /// Draft of the open add/edit dialog.
    pub fn draft(&self) -> Option<&ObstacleDraft> {
        match &self.state {
            FlowState::AddDraft(draft) | FlowState::EditDraft { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Record copy shown by the photo view.
    pub fn photo_view(&self) -> Option<&Obstacle> {
        match &self.state {
            FlowState::PhotoView(obstacle) => Some(obstacle),
            _ => None,
        }
    }

    /// Opens the add dialog with a blank draft.
    pub fn open_add(&mut self) -> FlowResult<()> {
        self.require_idle("open_add")?;
        self.state = FlowState::AddDraft(ObstacleDraft::default());
        Ok(())
    }

    /// Opens the edit dialog pre-filled from the record with `id`.
    pub fn open_edit<S: KeyValueStore>(
        &mut self,
        store: &ObstacleStore<S>,
        id: ObstacleId,
    ) -> FlowResult<()> {
        self.require_idle("open_edit")?;
        let obstacle = store.get(id).ok_or(FlowError::ObstacleNotFound(id))?;
        self.state = FlowState::EditDraft {
            id,
            draft: obstacle.to_draft(),
        };
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> FlowResult<()> {
        let draft = self.draft_mut("set_title")?;
        draft.title = title.into();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> FlowResult<()> {
        let draft = self.draft_mut("set_description")?;
        draft.description = description.into();
        Ok(())
    }

    /// Closes whatever dialog is open. Drafts are discarded.
    pub fn cancel(&mut self) {
        self.state = FlowState::Idle;
    }

    /// Commits the open draft through `add` or `edit`.
    ///
    /// On a store error the draft is kept so the user can retry.
    pub fn commit<'s, S: KeyValueStore>(
        &mut self,
        store: &'s mut ObstacleStore<S>,
    ) -> FlowResult<&'s [Obstacle]> {
        let result = match &self.state {
            FlowState::AddDraft(draft) => store.add(draft),
            FlowState::EditDraft { id, draft } => store.edit(*id, draft),
            other => return Err(invalid(other, "commit")),
        };
        let obstacles = result?;
        self.state = FlowState::Idle;
        Ok(obstacles)
    }

    /// Opens the photo view bound to the record with `id`.
    pub fn open_photos<S: KeyValueStore>(
        &mut self,
        store: &ObstacleStore<S>,
        id: ObstacleId,
    ) -> FlowResult<()> {
        self.require_idle("open_photos")?;
        let obstacle = store.get(id).ok_or(FlowError::ObstacleNotFound(id))?;
        self.state = FlowState::PhotoView(obstacle.clone());
        Ok(())
    }

    /// Resolves a photo from `source` and attaches it to the current record.
    ///
    /// Allowed from the photo view and the edit dialog; in the edit dialog
    /// the draft fields are left alone.
    pub fn add_photo<S, R>(
        &mut self,
        store: &mut ObstacleStore<S>,
        resolver: &mut R,
        source: PhotoSource,
    ) -> FlowResult<PhotoOutcome>
    where
        S: KeyValueStore,
        R: AttachmentResolver + ?Sized,
    {
        let id = match &self.state {
            FlowState::PhotoView(obstacle) => obstacle.id,
            FlowState::EditDraft { id, .. } => *id,
            FlowState::AddDraft(_) => return Ok(PhotoOutcome::NoTarget),
            other => return Err(invalid(other, "add_photo")),
        };

        let uri = match resolve(resolver, source) {
            Ok(ResolvedPhoto::Uri(uri)) => uri,
            Ok(ResolvedPhoto::Cancelled) => {
                info!("event=photo_attach module=flow status=cancelled id={id}");
                return Ok(PhotoOutcome::Cancelled);
            }
            Err(err) => {
                warn!("event=photo_attach module=flow status=error id={id} error={err}");
                return Err(err.into());
            }
        };
        if !is_photo_uri(&uri) {
            warn!("event=photo_attach module=flow status=error id={id} error_code=invalid_uri");
            return Err(FlowError::InvalidPhotoUri(uri));
        }

        let change = store.attach_photo(id, uri)?;
        let updated = change
            .obstacle
            .cloned()
            .ok_or(FlowError::ObstacleNotFound(id))?;
        if let FlowState::PhotoView(view) = &mut self.state {
            *view = updated.clone();
        }
        Ok(PhotoOutcome::Attached(updated))
    }

    /// Removes `uri` from the record bound to the photo view.
    pub fn remove_photo<S: KeyValueStore>(
        &mut self,
        store: &mut ObstacleStore<S>,
        uri: &str,
    ) -> FlowResult<Obstacle> {
        let id = match &self.state {
            FlowState::PhotoView(obstacle) => obstacle.id,
            other => return Err(invalid(other, "remove_photo")),
        };

        let change = store.detach_photo(id, uri)?;
        let updated = change
            .obstacle
            .cloned()
            .ok_or(FlowError::ObstacleNotFound(id))?;
        self.state = FlowState::PhotoView(updated.clone());
        Ok(updated)
    }

    fn require_idle(&self, action: &'static str) -> FlowResult<()> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(invalid(&self.state, action))
        }
    }

    fn draft_mut(&mut self, action: &'static str) -> FlowResult<&mut ObstacleDraft> {
        match &mut self.state {
            FlowState::AddDraft(draft) | FlowState::EditDraft { draft, .. } => Ok(draft),
            other => Err(invalid(other, action)),
        }
    }
}

fn invalid(state: &FlowState, action: &'static str) -> FlowError {
    FlowError::InvalidTransition {
        state: state.name(),
        action,
    }
}
