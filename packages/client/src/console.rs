//! Interactive console around a [`ChatSession`].

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    error::ClientError,
    formatter::MessageFormatter,
    session::{ChatSession, SessionOptions, SessionUpdate},
    ui::print_above_prompt,
};

/// Read lines on a blocking thread. The receiver ends on Ctrl+C or Ctrl+D.
pub fn spawn_readline(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}

/// Drive an open session until the user quits (`Ok`) or the connection is lost.
pub async fn run_console_session(
    mut session: ChatSession,
    mut inbound: mpsc::UnboundedReceiver<String>,
    options: &SessionOptions,
    input: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let viewer_name = options.viewer_name.as_str();
    let stream_id = options.stream_id.as_str();

    print_above_prompt(
        &MessageFormatter::format_history(stream_id, session.messages(), viewer_name),
        viewer_name,
    );
    if !session.permission().can_chat() {
        print_above_prompt(
            &MessageFormatter::format_system("This link is view-only; your messages will not be sent"),
            viewer_name,
        );
    }

    loop {
        tokio::select! {
            frame = inbound.recv() => {
                let Some(frame) = frame else {
                    session.close();
                    return Err(ClientError::ConnectionError("Connection lost".to_string()));
                };
                let text = match session.handle_frame(&frame) {
                    Some(SessionUpdate::Chat(entry)) => MessageFormatter::format_chat(&entry, viewer_name),
                    Some(SessionUpdate::ViewerCount(count)) => MessageFormatter::format_viewer_count(count),
                    Some(SessionUpdate::StreamStatus(status)) => MessageFormatter::format_stream_status(status),
                    Some(SessionUpdate::System(message)) => MessageFormatter::format_system(&message),
                    None => continue,
                };
                print_above_prompt(&text, viewer_name);
            }
            line = input.recv() => {
                let Some(line) = line else {
                    session.close();
                    return Ok(());
                };
                if session.send_message(&line).is_none() {
                    tracing::debug!("Message was not sent");
                }
            }
        }
    }
}
