pub mod config;
pub mod history;
pub mod preview;
pub mod run;

/// `95` -> `1:35`.
pub(crate) fn format_secs(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
