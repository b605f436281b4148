//! Manage-account screen: a single "Reset Data Cache" action.

use std::sync::Arc;

use super::{DataService, ScreenTasks};

pub const TITLE: &str = "Manage Account";
pub const RESET_DATA_CACHE: &str = "Reset Data Cache";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManageAccountState {
    pub is_resetting: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ManageAccountMsg {
    ResetDataCache,
    DataCacheReset { ok: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageAccountEffect {
    ResetDataCache,
}

pub fn update(state: &mut ManageAccountState, msg: ManageAccountMsg) -> Vec<ManageAccountEffect> {
    match msg {
        ManageAccountMsg::ResetDataCache => {
            if state.is_resetting {
                return vec![];
            }
            state.is_resetting = true;
            state.error_message = None;
            vec![ManageAccountEffect::ResetDataCache]
        }
        ManageAccountMsg::DataCacheReset { ok } => {
            state.is_resetting = false;
            if !ok {
                state.error_message = Some("Unable to reset the data cache.".to_string());
            }
            vec![]
        }
    }
}

pub struct ManageAccountScreen {
    state: ManageAccountState,
    data: Arc<dyn DataService>,
    tasks: ScreenTasks<ManageAccountMsg>,
}

impl ManageAccountScreen {
    pub fn new(data: Arc<dyn DataService>) -> Self {
        Self {
            state: ManageAccountState::default(),
            data,
            tasks: ScreenTasks::new(),
        }
    }

    pub fn state(&self) -> &ManageAccountState {
        &self.state
    }

    pub fn reset_data_cache(&mut self) {
        self.dispatch(ManageAccountMsg::ResetDataCache);
    }

    pub fn dispatch(&mut self, msg: ManageAccountMsg) {
        for effect in update(&mut self.state, msg) {
            match effect {
                ManageAccountEffect::ResetDataCache => {
                    let data = self.data.clone();
                    self.tasks.spawn(async move {
                        let result = data.reset_data_cache().await;
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "data cache reset failed");
                        }
                        ManageAccountMsg::DataCacheReset { ok: result.is_ok() }
                    });
                }
            }
        }
    }

    pub async fn settle(&mut self) {
        while let Some(msg) = self.tasks.next().await {
            self.dispatch(msg);
        }
    }
}
