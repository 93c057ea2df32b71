//! Command-line interface parsing and the interactive loop.
//!
//! The loop is deliberately plain: one line of stdin per send, streamed
//! deltas echoed to stdout as they arrive. Rendering and layout belong to
//! other frontends; everything interesting happens in [`crate::core`].

use std::error::Error;
use std::io::Write as _;
use std::path::Path;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ProviderKind;
use crate::core::chat::{ChatController, SendOutcome, StreamUpdate};
use crate::core::config::{Config, CREDENTIAL_ENV_VAR};
use crate::core::history::HistoryStore;
use crate::core::message::{Attachment, Message};
use crate::core::personality::Personality;
use crate::core::session::SessionManager;
use crate::utils::logging::TranscriptLog;

#[derive(Parser)]
#[command(name = "lorz")]
#[command(about = "A terminal chat client with personalities and streamed AI replies")]
#[command(
    long_about = "Lorz is a line-oriented terminal chat client that talks to remote AI APIs. \
Replies stream in as they are generated; each personality keeps its own \
per-user conversation history and restores it on the next start.\n\n\
Environment Variables:\n\
  LORZ_API_KEY      API credential (overrides api_key from the config file)\n\
  RUST_LOG          Diagnostic log filter (written to stderr)\n\n\
Commands inside the chat:\n\
  /personality <p>  Switch personality (default, technical, creative, sarcastic)\n\
  /attach <path> [text]  Send an image file with an optional question\n\
  /quit             Leave the chat"
)]
pub struct Args {
    /// Name shown for your messages; also keys the stored history
    #[arg(short, long, default_value = "you")]
    pub username: String,

    /// Assistant personality; each one keeps a separate conversation
    #[arg(short = 'P', long, value_enum, default_value_t = Personality::Default)]
    pub personality: Personality,

    /// Inference provider
    #[arg(short = 'p', long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model identifier (defaults per provider)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override the provider base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Append finalized messages to this transcript file
    #[arg(short = 'l', long)]
    pub log: Option<String>,
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    let credential = match config.credential() {
        Ok(credential) => credential,
        Err(error) => {
            eprintln!("Lorz is not configured yet.");
            eprintln!();
            eprintln!(
                "Set the {CREDENTIAL_ENV_VAR} environment variable, or add api_key = \"...\" to:"
            );
            eprintln!("  {}", Config::config_path().display());
            tracing::debug!(%error, "startup blocked on missing credential");
            std::process::exit(1);
        }
    };

    let provider = args.provider.unwrap_or(config.provider());
    let model = args
        .model
        .or(config.model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());
    let base_url = args
        .base_url
        .or(config.base_url.clone())
        .unwrap_or_else(|| provider.default_base_url().to_string());

    let store = HistoryStore::open()?;
    let sessions = SessionManager::new(provider, model, base_url, Some(credential));
    let transcript = TranscriptLog::new(args.log)?;

    let (mut controller, mut events) =
        ChatController::new(args.username, args.personality, store, sessions, transcript);

    for message in controller.messages() {
        print_message(message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reply_open = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_line(&mut controller, line.trim()).await {
                    break;
                }
            }
            event = events.recv() => {
                let Some((message, stream_id)) = event else {
                    break;
                };
                match controller.handle_stream_message(message, stream_id) {
                    StreamUpdate::Delta(delta) => {
                        if !reply_open {
                            print!("Lorz: ");
                            reply_open = true;
                        }
                        print!("{delta}");
                        let _ = std::io::stdout().flush();
                    }
                    StreamUpdate::Finalized(reply) => {
                        if !reply_open {
                            print!("Lorz: {}", reply.text);
                        }
                        println!();
                        if let Some(sources) = &reply.sources {
                            println!("Sources:");
                            for source in sources {
                                println!("  - {} ({})", source.title, source.uri);
                            }
                        }
                        reply_open = false;
                    }
                    StreamUpdate::Failed(failure) => {
                        if reply_open {
                            println!();
                            reply_open = false;
                        }
                        println!("[{}] {}", failure.sender, failure.text);
                    }
                    StreamUpdate::Ignored => {}
                }
            }
        }
    }

    Ok(())
}

/// Dispatch one input line. Returns false when the loop should exit.
async fn handle_line(controller: &mut ChatController, line: &str) -> bool {
    match line {
        "" => true,
        "/quit" | "/exit" => false,
        _ if line.starts_with("/personality") => {
            let name = line.trim_start_matches("/personality").trim();
            match Personality::try_from(name) {
                Ok(personality) => {
                    if controller.switch_personality(personality).is_ok() {
                        for message in controller.messages() {
                            print_message(message);
                        }
                    }
                }
                Err(_) => {
                    println!(
                        "Unknown personality {name:?}; pick one of: default, technical, \
                         creative, sarcastic"
                    );
                }
            }
            true
        }
        _ if line.starts_with("/attach") => {
            let rest = line.trim_start_matches("/attach").trim();
            let (path, text) = match rest.split_once(char::is_whitespace) {
                Some((path, text)) => (path, text.trim()),
                None => (rest, ""),
            };
            if path.is_empty() {
                println!("Usage: /attach <path> [text]");
                return true;
            }
            let attachment = attachment_from_path(path);
            report_outcome(controller.send_message(text, Some(attachment)).await, controller);
            true
        }
        _ => {
            report_outcome(controller.send_message(line, None).await, controller);
            true
        }
    }
}

fn report_outcome(outcome: SendOutcome, controller: &ChatController) {
    if outcome == SendOutcome::Ignored && controller.is_in_flight() {
        println!("Still waiting for the previous reply; message not sent.");
    }
}

fn print_message(message: &Message) {
    if message.text.is_empty() {
        return;
    }
    println!("{}: {}", message.sender, message.text);
    if let Some(sources) = &message.sources {
        println!("Sources:");
        for source in sources {
            println!("  - {} ({})", source.title, source.uri);
        }
    }
}

fn attachment_from_path(path: &str) -> Attachment {
    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    Attachment {
        url: path.to_string(),
        mime_type: guess_mime(path).to_string(),
        name,
    }
}

fn guess_mime(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guessing_covers_common_image_types() {
        assert_eq!(guess_mime("cat.png"), "image/png");
        assert_eq!(guess_mime("photo.JPEG"), "image/jpeg");
        assert_eq!(guess_mime("anim.gif"), "image/gif");
        assert_eq!(guess_mime("notes.txt"), "application/octet-stream");
        assert_eq!(guess_mime("noext"), "application/octet-stream");
    }

    #[test]
    fn attachments_carry_the_file_name() {
        let attachment = attachment_from_path("/tmp/photos/cat.png");
        assert_eq!(attachment.name, "cat.png");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.url, "/tmp/photos/cat.png");
    }
}
