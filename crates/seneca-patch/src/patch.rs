//! Patch operations and sinks

use crate::render::{escape_html, unescape_html};
use serde::{Deserialize, Serialize};

/// Well-known page selectors
pub mod selectors {
    use seneca_record::stable_id;

    /// Container holding every plot and table element
    pub const PLOTS_CONTAINER: &str = "#plots-container";
    /// List of routines and their elements
    pub const PLOT_LIST: &str = "#plot-list";
    /// Status panel
    pub const STATUS: &str = "#status";

    /// DOM id of a routine's list container, distinct per routine file
    #[must_use]
    pub fn routine_list_id(routine_file: &str) -> String {
        format!("plot-list-{}", stable_id("r", routine_file))
    }

    /// Selector of a routine's list container
    #[must_use]
    pub fn routine_list(routine_file: &str) -> String {
        format!("#{}", routine_list_id(routine_file))
    }

    /// Selector of an element by DOM id
    #[must_use]
    pub fn element(dom_id: &str) -> String {
        format!("#{dom_id}")
    }
}

/// Client-side functions invoked by patches
pub mod client {
    /// `init_img(url, id)`
    pub const INIT_IMG: &str = "init_img";
    /// `update_img(url, id)`
    pub const UPDATE_IMG: &str = "update_img";
    /// `init_table(id)`
    pub const INIT_TABLE: &str = "init_table";
    /// Start the analysis timer
    pub const START_TIMER: &str = "start_timer";
    /// Stop the analysis timer (pause)
    pub const STOP_TIMER: &str = "stop_timer";
    /// Reset the analysis timer (stop)
    pub const RESET_TIMER: &str = "reset_timer";
    /// `adjust_routine_class(routine_id, class)`
    pub const ADJUST_ROUTINE_CLASS: &str = "adjust_routine_class";
}

/// One UI patch operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// Append markup to the element matching `parent_selector`
    AppendContainer {
        /// Target selector
        parent_selector: String,
        /// Markup to append
        html: String,
    },
    /// Replace the inner HTML of matching elements
    SetHtml {
        /// Target selector
        selector: String,
        /// New inner markup
        html: String,
    },
    /// Call a client-side function
    InvokeClient {
        /// Function name
        function: String,
        /// Positional arguments
        args: Vec<serde_json::Value>,
    },
    /// Append one line to the status panel (already HTML-escaped)
    AppendStatus {
        /// Escaped status text
        text: String,
    },
}

impl Patch {
    /// `append_container`
    pub fn append(parent_selector: impl Into<String>, html: impl Into<String>) -> Self {
        Self::AppendContainer {
            parent_selector: parent_selector.into(),
            html: html.into(),
        }
    }

    /// `set_html`
    pub fn set_html(selector: impl Into<String>, html: impl Into<String>) -> Self {
        Self::SetHtml {
            selector: selector.into(),
            html: html.into(),
        }
    }

    /// `invoke_client`
    pub fn invoke(function: &str, args: Vec<serde_json::Value>) -> Self {
        Self::InvokeClient {
            function: function.to_string(),
            args,
        }
    }

    /// `append_status`; escapes `message`
    #[must_use]
    pub fn status(message: &str) -> Self {
        Self::AppendStatus {
            text: escape_html(message),
        }
    }

    /// Unescaped status text, for `append_status` patches
    #[must_use]
    pub fn status_text(&self) -> Option<String> {
        match self {
            Self::AppendStatus { text } => Some(unescape_html(text)),
            _ => None,
        }
    }

    /// Operation name, as serialized
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::AppendContainer { .. } => "append_container",
            Self::SetHtml { .. } => "set_html",
            Self::InvokeClient { .. } => "invoke_client",
            Self::AppendStatus { .. } => "append_status",
        }
    }
}

/// Ordered consumer of patches
pub trait PatchSink {
    /// Deliver one patch; calls arrive in emission order
    fn send(&mut self, patch: Patch);

    /// Deliver patches in order
    fn send_all(&mut self, patches: impl IntoIterator<Item = Patch>)
    where
        Self: Sized,
    {
        for patch in patches {
            self.send(patch);
        }
    }
}

impl PatchSink for Vec<Patch> {
    fn send(&mut self, patch: Patch) {
        self.push(patch);
    }
}
