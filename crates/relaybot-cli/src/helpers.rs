//! Shared CLI helpers — path expansion, banner, status lines.

use std::path::PathBuf;

use colored::Colorize;

use relaybot_core::types::{RelaySessionState, StatusSnapshot};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "📡 Relaybot".cyan().bold(), version.dimmed());
    println!();
}

/// `✓` / `✗` marker.
pub fn mark(ok: bool) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Colored one-word rendering of a session state.
pub fn state_label(state: &RelaySessionState) -> String {
    match state {
        RelaySessionState::Running => state.label().green().bold().to_string(),
        RelaySessionState::Starting | RelaySessionState::Stopping => {
            state.label().yellow().to_string()
        }
        RelaySessionState::Stopped => state.label().dimmed().to_string(),
        RelaySessionState::Failed(_) => state.label().red().bold().to_string(),
    }
}

/// One line describing a snapshot, printed on every state change.
pub fn status_line(snapshot: &StatusSnapshot) -> String {
    let mut line = format!(
        "{}  {}",
        chrono::Local::now().format("%H:%M:%S").to_string().dimmed(),
        state_label(&snapshot.state)
    );
    match &snapshot.state {
        RelaySessionState::Running => {
            line.push_str(&format!(
                "  channels: {}  forwarded: {}  dropped: {}",
                snapshot.resolved_channel_count,
                snapshot.forwarded_count,
                snapshot.failed_delivery_count
            ));
        }
        RelaySessionState::Failed(reason) => line.push_str(&format!("  {reason}")),
        _ => {}
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_core::types::FailureReason;

    #[test]
    fn expand_tilde_home() {
        let result = expand_tilde("~/foo/bar");
        assert!(result.ends_with("foo/bar"));
        assert!(!result.starts_with("~"));
    }

    #[test]
    fn expand_tilde_absolute() {
        assert_eq!(expand_tilde("/etc/relay.json"), PathBuf::from("/etc/relay.json"));
    }

    #[test]
    fn status_line_running_shows_counters() {
        let snapshot = StatusSnapshot {
            state: RelaySessionState::Running,
            resolved_channel_count: 2,
            has_destination_credential: true,
            forwarded_count: 5,
            failed_delivery_count: 1,
        };
        let line = status_line(&snapshot);
        assert!(line.contains("channels: 2"));
        assert!(line.contains("forwarded: 5"));
        assert!(line.contains("dropped: 1"));
    }

    #[test]
    fn status_line_failed_shows_reason() {
        let snapshot = StatusSnapshot {
            state: RelaySessionState::Failed(FailureReason::NoChannelsResolved),
            ..Default::default()
        };
        assert!(status_line(&snapshot).contains("could be resolved"));
    }
}
