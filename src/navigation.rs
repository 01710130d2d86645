// SPDX-License-Identifier: GPL-3.0-only

//! Navigation sinks for a completed scan

use crate::backends::NavigationSink;
use crate::constants::DETAIL_URL_PLACEHOLDER;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Opens the plant's detail page in the default browser
#[derive(Debug, Clone)]
pub struct UrlNavigator {
    template: String,
}

impl UrlNavigator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Detail URL for a plant id
    pub fn detail_url(&self, identifier: &str) -> String {
        self.template
            .replace(DETAIL_URL_PLACEHOLDER, &encode_path_segment(identifier.trim()))
    }
}

impl NavigationSink for UrlNavigator {
    fn navigate_to(&self, identifier: &str) {
        let url = self.detail_url(identifier);
        info!(%url, "Opening plant detail");
        if let Err(e) = open::that_detached(&url) {
            warn!(%url, error = %e, "Failed to open plant detail");
        }
    }
}

/// Remembers every navigation instead of performing it
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NavigationSink for RecordingNavigator {
    fn navigate_to(&self, identifier: &str) {
        info!(identifier, "Navigation requested");
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identifier.to_string());
    }
}

/// Percent-encode everything outside the unreserved set
fn encode_path_segment(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char)
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}
