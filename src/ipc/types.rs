use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::error::{PortalError, Result};
use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Successful handler output; the variant decides the response status.
#[derive(Debug)]
pub enum Reply {
    Ok(serde_json::Value),
    Created(serde_json::Value),
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn Store>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            store: None,
        }
    }

    pub fn store(&self) -> Result<&(dyn Store + 'static)> {
        self.store.as_deref().ok_or(PortalError::NoWorkspace)
    }

    pub fn store_mut(&mut self) -> Result<&mut (dyn Store + 'static)> {
        match self.store.as_deref_mut() {
            Some(s) => Ok(s),
            None => Err(PortalError::NoWorkspace),
        }
    }
}
