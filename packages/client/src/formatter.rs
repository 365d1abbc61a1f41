//! Message formatting for the console client.

use chrono::{DateTime, Local, Utc};
use onair_server::domain::{MessageKind, StreamStatus};

use crate::session::ChatEntry;

const RULE: &str = "------------------------------------------------------------";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Banner printed once the session is open, followed by the loaded history.
    pub fn format_history(stream_id: &str, entries: &[ChatEntry], viewer_name: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{RULE}\nStream {stream_id}\n{RULE}\n"));
        if entries.is_empty() {
            output.push_str("(No messages yet)\n");
        }
        for entry in entries {
            output.push_str(&Self::format_chat(entry, viewer_name));
        }
        output.push_str(&format!("{RULE}\n"));
        output
    }

    /// One chat line. The viewer's own messages are marked with "(me)".
    pub fn format_chat(entry: &ChatEntry, viewer_name: &str) -> String {
        let me = if entry.viewer_name == viewer_name { " (me)" } else { "" };
        let badge = match entry.kind {
            MessageKind::Regular => "",
            MessageKind::Moderator => "[mod] ",
            MessageKind::System => "[system] ",
        };
        format!(
            "[{}] {}@{}{}: {}\n",
            local_time(entry.timestamp),
            badge,
            entry.viewer_name,
            me,
            entry.message
        )
    }

    pub fn format_viewer_count(count: usize) -> String {
        let noun = if count == 1 { "viewer" } else { "viewers" };
        format!("* {count} {noun} watching\n")
    }

    pub fn format_stream_status(status: StreamStatus) -> String {
        match status {
            StreamStatus::Live => "* The stream is live\n".to_string(),
            StreamStatus::Ended => "* The stream has ended\n".to_string(),
            StreamStatus::Idle => "* The stream is not live yet\n".to_string(),
        }
    }

    pub fn format_system(message: &str) -> String {
        format!("! {message}\n")
    }
}

fn local_time(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
}
