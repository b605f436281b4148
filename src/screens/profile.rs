//! Profile screen.
//!
//! Shows the viewer's card, rendered first from the cached viewer and then
//! refreshed from the network, and offers account deletion.

use std::sync::Arc;

use super::{Authenticator, DataService, ScreenTasks, Viewer};

pub const UNABLE_TO_LOAD_ACCOUNT: &str = "Unable to load account information.";
pub const UNABLE_TO_DELETE_ACCOUNT: &str = "We were unable to delete your account.";

/// "Readlater Version 1.2.3", or empty when the version is unknown.
pub fn app_version_string(app_version: Option<&str>) -> String {
    match app_version {
        Some(version) if !version.is_empty() => format!("Readlater Version {}", version),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileCardData {
    pub name: String,
    pub username: String,
    pub image_url: Option<String>,
}

impl From<&Viewer> for ProfileCardData {
    fn from(viewer: &Viewer) -> Self {
        Self {
            name: viewer.name.clone(),
            username: viewer.username.clone(),
            image_url: viewer.profile_image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileState {
    pub is_loading: bool,
    pub profile_card: ProfileCardData,
    pub delete_account_error_message: Option<String>,
    /// Bumped on every load; fetch results tagged with an older value are
    /// dropped.
    pub load_generation: u64,
    pub is_deleting: bool,
}

#[derive(Debug, Clone)]
pub enum ProfileMsg {
    Load { cached: Option<Viewer> },
    ViewerFetched { generation: u64, viewer: Option<Viewer> },
    DeleteAccount { cached: Option<Viewer> },
    AccountDeleted { ok: bool },
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEffect {
    FetchViewer { generation: u64 },
    DeleteAccount { user_id: String },
    Logout { is_account_deletion: bool },
}

pub fn update(state: &mut ProfileState, msg: ProfileMsg) -> Vec<ProfileEffect> {
    match msg {
        ProfileMsg::Load { cached } => {
            if let Some(viewer) = &cached {
                state.profile_card = ProfileCardData::from(viewer);
            }
            state.load_generation += 1;
            state.is_loading = true;
            vec![ProfileEffect::FetchViewer {
                generation: state.load_generation,
            }]
        }
        ProfileMsg::ViewerFetched { generation, viewer } => {
            if generation != state.load_generation {
                return vec![];
            }
            state.is_loading = false;
            if let Some(viewer) = &viewer {
                state.profile_card = ProfileCardData::from(viewer);
            }
            vec![]
        }
        ProfileMsg::DeleteAccount { cached } => {
            if state.is_deleting {
                return vec![];
            }
            let Some(viewer) = cached else {
                state.delete_account_error_message = Some(UNABLE_TO_LOAD_ACCOUNT.to_string());
                return vec![];
            };
            state.delete_account_error_message = None;
            state.is_deleting = true;
            vec![ProfileEffect::DeleteAccount { user_id: viewer.id }]
        }
        ProfileMsg::AccountDeleted { ok } => {
            state.is_deleting = false;
            if ok {
                vec![ProfileEffect::Logout {
                    is_account_deletion: true,
                }]
            } else {
                state.delete_account_error_message = Some(UNABLE_TO_DELETE_ACCOUNT.to_string());
                vec![]
            }
        }
        ProfileMsg::LoggedOut => vec![],
    }
}

/// Profile view-model bound to its collaborators.
pub struct ProfileScreen {
    state: ProfileState,
    data: Arc<dyn DataService>,
    auth: Arc<dyn Authenticator>,
    tasks: ScreenTasks<ProfileMsg>,
}

impl ProfileScreen {
    pub fn new(data: Arc<dyn DataService>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            state: ProfileState::default(),
            data,
            auth,
            tasks: ScreenTasks::new(),
        }
    }

    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    pub fn load(&mut self) {
        let cached = self.data.current_viewer();
        self.dispatch(ProfileMsg::Load { cached });
    }

    pub fn delete_account(&mut self) {
        let cached = self.data.current_viewer();
        self.dispatch(ProfileMsg::DeleteAccount { cached });
    }

    pub fn dispatch(&mut self, msg: ProfileMsg) {
        for effect in update(&mut self.state, msg) {
            self.run(effect);
        }
    }

    fn run(&mut self, effect: ProfileEffect) {
        match effect {
            ProfileEffect::FetchViewer { generation } => {
                let data = self.data.clone();
                self.tasks.spawn(async move {
                    let viewer = match data.fetch_viewer().await {
                        Ok(viewer) => Some(viewer),
                        Err(e) => {
                            tracing::debug!(error = %e, "viewer refresh failed");
                            None
                        }
                    };
                    ProfileMsg::ViewerFetched { generation, viewer }
                });
            }
            ProfileEffect::DeleteAccount { user_id } => {
                let data = self.data.clone();
                self.tasks.spawn(async move {
                    let result = data.delete_account(&user_id).await;
                    if let Err(e) = &result {
                        tracing::warn!(error = %e, "account deletion failed");
                    }
                    ProfileMsg::AccountDeleted { ok: result.is_ok() }
                });
            }
            ProfileEffect::Logout {
                is_account_deletion,
            } => {
                let auth = self.auth.clone();
                self.tasks.spawn(async move {
                    auth.logout(is_account_deletion).await;
                    ProfileMsg::LoggedOut
                });
            }
        }
    }

    /// Applies the next task result. Returns `false` when nothing is left
    /// running.
    pub async fn next(&mut self) -> bool {
        match self.tasks.next().await {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        }
    }

    /// Runs until every started task has reported back.
    pub async fn settle(&mut self) {
        while self.next().await {}
    }
}
