//! GUI Shell
//!
//! The desktop window that hosts the lit GUI page, plus the event loop that
//! talks to it. The window itself is only built with the `desktop` feature.

pub mod events;
#[cfg(feature = "desktop")]
mod window;

pub use events::{
    event_channel, EventLoop, EventSender, MessageSink, ShellEvent, ShellMessage, ABOUT_HTML,
};
#[cfg(feature = "desktop")]
pub use window::run_window;

/// Label of the window hosting the GUI page. The capability in
/// `capabilities/default.json` is scoped to it.
pub const MAIN_WINDOW: &str = "main";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::Value;

    const CAPABILITY: &str = include_str!("../../capabilities/default.json");

    #[test]
    fn test_page_may_reach_the_shell() {
        let capability: Value = serde_json::from_str(CAPABILITY).unwrap();

        let windows = capability["windows"].as_array().unwrap();
        assert!(windows.iter().any(|w| *w == MAIN_WINDOW));

        let permissions = capability["permissions"].as_array().unwrap();
        assert!(permissions.iter().any(|p| *p == "core:event:default"));
        assert!(permissions.iter().any(|p| *p == "allow-shell-message"));

        // The page is remote content, so its origin must be listed
        let homepage = AppConfig::from_args(["lit-af"]).unwrap().homepage_url();
        let urls = capability["remote"]["urls"].as_array().unwrap();
        assert!(urls.iter().filter_map(Value::as_str).any(|pattern| {
            pattern
                .strip_suffix("/*")
                .is_some_and(|origin| homepage.starts_with(&format!("{}/", origin)))
        }));
    }
}
