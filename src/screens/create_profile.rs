//! Create-profile screen.
//!
//! The username field is validated as the user types: edits are debounced,
//! checked locally, then checked for availability on the server. Results
//! for a username that is no longer in the field are dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

use super::{
    Authenticator, DataService, LoginError, PotentialUsernameStatus, ScreenTasks, UserProfile,
    UsernameError,
};

pub const USERNAME_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProfileState {
    pub initial_profile: UserProfile,
    pub potential_username: String,
    pub potential_username_status: PotentialUsernameStatus,
    pub login_error: Option<LoginError>,
    pub validation_error_message: Option<String>,
}

impl CreateProfileState {
    pub fn new(initial_profile: UserProfile) -> Self {
        Self {
            potential_username: initial_profile.username.clone(),
            initial_profile,
            potential_username_status: PotentialUsernameStatus::NoUsername,
            login_error: None,
            validation_error_message: None,
        }
    }

    pub fn has_suggested_profile(&self) -> bool {
        !(self.initial_profile.name.is_empty() && self.initial_profile.username.is_empty())
    }

    pub fn headline_text(&self) -> &'static str {
        if self.has_suggested_profile() {
            "Confirm Your Profile"
        } else {
            "Create Your Profile"
        }
    }

    pub fn submit_button_text(&self) -> &'static str {
        if self.has_suggested_profile() {
            "Confirm"
        } else {
            "Submit"
        }
    }
}

#[derive(Debug, Clone)]
pub enum CreateProfileMsg {
    UsernameChanged(String),
    DebounceElapsed(String),
    UsernameValidated {
        username: String,
        result: Result<(), UsernameError>,
    },
    Submit {
        name: String,
        bio: String,
    },
    AccountCreated(Result<(), LoginError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateProfileEffect {
    /// Restart the debounce timer for `username`.
    Debounce(String),
    ValidateRemote(String),
    CreateAccount(UserProfile),
}

pub fn update(state: &mut CreateProfileState, msg: CreateProfileMsg) -> Vec<CreateProfileEffect> {
    match msg {
        CreateProfileMsg::UsernameChanged(username) => {
            state.potential_username = username.clone();
            vec![CreateProfileEffect::Debounce(username)]
        }
        CreateProfileMsg::DebounceElapsed(username) => {
            if username != state.potential_username {
                return vec![];
            }
            if let Some(status) = PotentialUsernameStatus::validation_error(&username.to_lowercase())
            {
                state.potential_username_status = status;
                return vec![];
            }
            vec![CreateProfileEffect::ValidateRemote(username)]
        }
        CreateProfileMsg::UsernameValidated { username, result } => {
            if username != state.potential_username {
                return vec![];
            }
            match result {
                Ok(()) => state.potential_username_status = PotentialUsernameStatus::Available,
                Err(UsernameError::TooShort) => {
                    state.potential_username_status = PotentialUsernameStatus::TooShort
                }
                Err(UsernameError::TooLong) => {
                    state.potential_username_status = PotentialUsernameStatus::TooLong
                }
                Err(UsernameError::InvalidPattern) => {
                    state.potential_username_status = PotentialUsernameStatus::InvalidPattern
                }
                Err(UsernameError::NameUnavailable) => {
                    state.potential_username_status = PotentialUsernameStatus::Unavailable
                }
                Err(UsernameError::InternalServer | UsernameError::Unknown) => {
                    state.login_error = Some(LoginError::Unknown)
                }
                Err(UsernameError::Network) => state.login_error = Some(LoginError::Network),
            }
            vec![]
        }
        CreateProfileMsg::Submit { name, bio } => {
            let bio = if bio.is_empty() { None } else { Some(bio) };
            match UserProfile::make(&state.potential_username, &name, bio) {
                Ok(profile) => {
                    state.validation_error_message = None;
                    vec![CreateProfileEffect::CreateAccount(profile)]
                }
                Err(message) => {
                    state.validation_error_message = Some(message);
                    vec![]
                }
            }
        }
        CreateProfileMsg::AccountCreated(result) => {
            if let Err(e) = result {
                state.login_error = Some(e);
            }
            vec![]
        }
    }
}

/// Create-profile view-model bound to its collaborators.
pub struct CreateProfileScreen {
    state: CreateProfileState,
    data: Arc<dyn DataService>,
    auth: Arc<dyn Authenticator>,
    tasks: ScreenTasks<CreateProfileMsg>,
    debounce: Option<AbortHandle>,
}

impl CreateProfileScreen {
    /// Builds the screen and schedules validation of the suggested
    /// username.
    pub fn new(
        initial_profile: UserProfile,
        data: Arc<dyn DataService>,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        let username = initial_profile.username.clone();
        let mut screen = Self {
            state: CreateProfileState::new(initial_profile),
            data,
            auth,
            tasks: ScreenTasks::new(),
            debounce: None,
        };
        screen.dispatch(CreateProfileMsg::UsernameChanged(username));
        screen
    }

    pub fn state(&self) -> &CreateProfileState {
        &self.state
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.dispatch(CreateProfileMsg::UsernameChanged(username.into()));
    }

    pub fn submit(&mut self, name: impl Into<String>, bio: impl Into<String>) {
        self.dispatch(CreateProfileMsg::Submit {
            name: name.into(),
            bio: bio.into(),
        });
    }

    pub fn dispatch(&mut self, msg: CreateProfileMsg) {
        for effect in update(&mut self.state, msg) {
            self.run(effect);
        }
    }

    fn run(&mut self, effect: CreateProfileEffect) {
        match effect {
            CreateProfileEffect::Debounce(username) => {
                if let Some(previous) = self.debounce.take() {
                    previous.abort();
                }
                let handle = self.tasks.spawn(async move {
                    tokio::time::sleep(USERNAME_DEBOUNCE).await;
                    CreateProfileMsg::DebounceElapsed(username)
                });
                self.debounce = Some(handle);
            }
            CreateProfileEffect::ValidateRemote(username) => {
                let data = self.data.clone();
                self.tasks.spawn(async move {
                    let result = data.validate_username(&username).await;
                    CreateProfileMsg::UsernameValidated { username, result }
                });
            }
            CreateProfileEffect::CreateAccount(profile) => {
                let auth = self.auth.clone();
                self.tasks.spawn(async move {
                    CreateProfileMsg::AccountCreated(auth.create_account(profile).await)
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

    pub async fn settle(&mut self) {
        while self.next().await {}
    }
}
