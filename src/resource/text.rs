use std::sync::Arc;

use anyhow::{Context, Result};

use super::{PendingLoad, Resources};
use crate::error::ResourceError;

pub(crate) fn decode_utf8(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).context("asset is not valid UTF-8")
}

fn strip_bom(text: String) -> Result<String> {
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => Ok(stripped.to_string()),
        None => Ok(text),
    }
}

impl Resources {
    pub fn load_text(&self, key: &str) -> Option<PendingLoad> {
        self.load_decode_parse(&self.text, key, decode_utf8, strip_bom)
    }

    pub fn get_text(&self, key: &str) -> Result<Arc<String>, ResourceError> {
        self.text.get_resource(key)
    }

    pub fn unload_text(&self, key: &str) -> Result<bool, ResourceError> {
        self.text.unload_resource(key)
    }
}
