//! Line-oriented terminal interface
//!
//! Reads commands from stdin and forwards them to the client task, and prints whatever
//! changed between consecutive session snapshots.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use multichat_core::{ChatError, ClientHandle, PortNumber, Recipient, Session, UserId};

use crate::config::CliConfig;
use crate::error::{CliError, Result};

pub const HELP: &str = "\
Commands:
  /user NAME     choose who you are (while disconnected)
  /port N        choose the server port (while disconnected)
  /connect       connect, or disconnect when already connected
  /disconnect    drop the current connection
  /to USER|-     choose the recipient, '-' for nobody
  /who           list online users
  /status        show the connection summary
  /help          show this help
  /quit          leave
Any other line is sent to the selected recipient.";

// ----------------------------------------------------------------------------
// Input Parsing
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    User(String),
    Port(PortNumber),
    Toggle,
    Disconnect,
    To(Recipient),
    Who,
    Status,
    Help,
    Quit,
    Send(String),
    Empty,
    Invalid(String),
}

pub fn parse_input(line: &str) -> InputCommand {
    let line = line.trim();
    if line.is_empty() {
        return InputCommand::Empty;
    }
    if !line.starts_with('/') {
        return InputCommand::Send(line.to_string());
    }

    let (command, argument) = match line.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "/user" => InputCommand::User(argument.to_string()),
        "/port" => match argument.parse::<PortNumber>() {
            Ok(port) => InputCommand::Port(port),
            Err(_) => InputCommand::Invalid(format!("'{}' is not a port number", argument)),
        },
        "/connect" => InputCommand::Toggle,
        "/disconnect" => InputCommand::Disconnect,
        "/to" => match argument {
            "" => InputCommand::Invalid("usage: /to USER|-".to_string()),
            "-" => InputCommand::To(Recipient::None),
            user => InputCommand::To(Recipient::User(UserId::from(user))),
        },
        "/who" => InputCommand::Who,
        "/status" => InputCommand::Status,
        "/help" => InputCommand::Help,
        "/quit" | "/exit" => InputCommand::Quit,
        other => InputCommand::Invalid(format!("unknown command {}", other)),
    }
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// One message line; `local_user` marks lines the user sent themselves
pub fn format_message(message: &multichat_core::Message, local_user: Option<&UserId>) -> String {
    let own = if local_user == Some(&message.from) { " (you)" } else { "" };
    let forwarded = if message.forwarded { " (fwd)" } else { "" };
    format!(
        "[{}] {}{} -> {}{}: {}",
        message.sequence, message.from, own, message.to, forwarded, message.text
    )
}

pub fn format_roster(roster: &[UserId]) -> String {
    if roster.is_empty() {
        "Online: nobody else".to_string()
    } else {
        let names: Vec<&str> = roster.iter().map(UserId::as_str).collect();
        format!("Online: {}", names.join(", "))
    }
}

pub fn format_summary(session: &Session) -> String {
    let user = session
        .user()
        .map(UserId::as_str)
        .unwrap_or("(none)")
        .to_string();
    let port = session
        .port()
        .map(|port| port.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    format!(
        "{} | user {} | port {} | to {} | {}",
        session.state(),
        user,
        port,
        session.recipient(),
        session.status()
    )
}

/// Lines describing what changed from `previous` to `next`
pub fn render_changes(previous: &Session, next: &Session, config: &CliConfig) -> Vec<String> {
    let mut lines = Vec::new();

    if previous.status() != next.status() || previous.is_error() != next.is_error() {
        let tag = if next.is_error() { "error" } else { "status" };
        lines.push(format!("[{}] {}", tag, next.status()));
    }

    if config.show_roster_updates && previous.roster() != next.roster() && next.is_connected() {
        lines.push(format_roster(next.roster()));
    }

    if previous.recipient() != next.recipient() {
        lines.push(format!("Sending to {}", next.recipient()));
    }

    let seen = previous.messages().len().min(next.messages().len());
    lines.extend(
        next.messages()[seen..]
            .iter()
            .map(|message| format_message(message, next.user())),
    );

    lines
}

// ----------------------------------------------------------------------------
// Interactive Loop
// ----------------------------------------------------------------------------

/// Whether the loop should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn show_prompt(prompt: &str) {
    print!("{}", prompt);
    if let Err(e) = std::io::stdout().flush() {
        debug!("Failed to flush stdout: {}", e);
    }
}

/// Line shown for a failed command; `None` when the loop cannot go on
pub fn describe_failure(error: &ChatError) -> Option<String> {
    match error {
        ChatError::ClientClosed => None,
        e if e.is_invalid_command() => Some(format!("! {}", e)),
        e => Some(format!("error: {}", e)),
    }
}

/// Print a rejected command and carry on; only a dead client task ends the loop
fn report(result: std::result::Result<(), ChatError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => match describe_failure(&e) {
            Some(line) => {
                println!("{}", line);
                Ok(())
            }
            None => Err(CliError::Chat(e)),
        },
    }
}

fn toggle_hint(session: &Session) -> Option<&'static str> {
    if session.can_toggle() {
        None
    } else if session.user().is_none() {
        Some("! choose a user with /user before connecting")
    } else {
        Some("! choose a port with /port before connecting")
    }
}

async fn execute(handle: &ClientHandle, command: InputCommand) -> Result<Flow> {
    match command {
        InputCommand::User(user) => report(handle.change_user(user).await)?,
        InputCommand::Port(port) => report(handle.change_port(port).await)?,
        InputCommand::Toggle => match toggle_hint(&handle.snapshot()) {
            Some(hint) => println!("{}", hint),
            None => report(handle.toggle_connection().await)?,
        },
        InputCommand::Disconnect => report(handle.disconnect().await)?,
        InputCommand::To(recipient) => report(handle.change_recipient(recipient).await)?,
        InputCommand::Who => println!("{}", format_roster(handle.snapshot().roster())),
        InputCommand::Status => println!("{}", format_summary(&handle.snapshot())),
        InputCommand::Help => println!("{}", HELP),
        InputCommand::Quit => return Ok(Flow::Quit),
        InputCommand::Send(text) => {
            report(handle.change_draft(text).await)?;
            report(handle.send_message().await)?;
        }
        InputCommand::Empty => {}
        InputCommand::Invalid(reason) => println!("! {}", reason),
    }
    Ok(Flow::Continue)
}

/// Run until `/quit`, end of input, or the client task going away
pub async fn run_interactive(handle: &ClientHandle, config: &CliConfig) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut snapshots = handle.subscribe();
    let mut shown = snapshots.borrow_and_update().clone();

    println!("{}", format_summary(&shown));
    println!("Type /help for commands.");
    show_prompt(&config.prompt);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input");
                    break;
                };
                if execute(handle, parse_input(&line)).await? == Flow::Quit {
                    break;
                }
                show_prompt(&config.prompt);
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = snapshots.borrow_and_update().clone();
                let lines = render_changes(&shown, &next, config);
                if !lines.is_empty() {
                    println!();
                    for line in lines {
                        println!("{}", line);
                    }
                    show_prompt(&config.prompt);
                }
                shown = next;
            }
        }
    }

    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use multichat_core::{Action, ClientConfig, Message};

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/user alice"), InputCommand::User("alice".into()));
        assert_eq!(parse_input("  /port 3002 "), InputCommand::Port(3002));
        assert_eq!(parse_input("/connect"), InputCommand::Toggle);
        assert_eq!(parse_input("/to -"), InputCommand::To(Recipient::None));
        assert_eq!(
            parse_input("/to bob"),
            InputCommand::To(Recipient::User(UserId::from("bob")))
        );
        assert_eq!(parse_input("/quit"), InputCommand::Quit);
        assert_eq!(parse_input(""), InputCommand::Empty);
    }

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse_input("hello there /not a command"),
            InputCommand::Send("hello there /not a command".into())
        );
    }

    #[test]
    fn test_invalid_commands() {
        assert!(matches!(parse_input("/port abc"), InputCommand::Invalid(_)));
        assert!(matches!(parse_input("/to"), InputCommand::Invalid(_)));
        assert!(matches!(parse_input("/dance"), InputCommand::Invalid(_)));
    }

    #[test]
    fn test_blank_user_argument_clears_user() {
        assert_eq!(parse_input("/user"), InputCommand::User(String::new()));
    }

    #[test]
    fn test_render_connection_and_messages() {
        let config = ClientConfig::default();
        let cli = CliConfig::default();
        let initial = Session::new(&config);

        let mut next = initial.clone();
        next.apply(Action::ChangeUser("alice".into()), &config);
        next.apply(Action::Connect, &config);
        next.apply(Action::ConnectionChanged(true), &config);
        next.apply(
            Action::RosterUpdated(vec![UserId::from("alice"), UserId::from("bob")]),
            &config,
        );
        next.apply(
            Action::MessageReceived(Message {
                forwarded: true,
                ..Message::outgoing(
                    UserId::from("bob"),
                    Recipient::User(UserId::from("alice")),
                    "hey",
                )
            }),
            &config,
        );

        let lines = render_changes(&initial, &next, &cli);
        assert_eq!(
            lines,
            vec![
                "[status] Connected".to_string(),
                "Online: bob".to_string(),
                "[0] bob -> alice (fwd): hey".to_string(),
            ]
        );
    }

    #[test]
    fn test_own_messages_are_marked() {
        let alice = UserId::from("alice");
        let sent = Message::outgoing(alice.clone(), Recipient::User(UserId::from("bob")), "hi");
        let received = Message::outgoing(UserId::from("bob"), Recipient::User(alice.clone()), "yo");

        assert_eq!(format_message(&sent, Some(&alice)), "[0] alice (you) -> bob: hi");
        assert_eq!(format_message(&received, Some(&alice)), "[0] bob -> alice: yo");
        assert_eq!(format_message(&sent, None), "[0] alice -> bob: hi");
    }

    #[test]
    fn test_toggle_needs_user_and_port() {
        let config = ClientConfig::default();
        let mut session = Session::new(&config);
        assert_eq!(
            toggle_hint(&session),
            Some("! choose a user with /user before connecting")
        );

        session.apply(Action::ChangeUser("alice".into()), &config);
        assert_eq!(toggle_hint(&session), None);
    }

    #[test]
    fn test_failure_lines() {
        assert_eq!(
            describe_failure(&ChatError::NoRecipient).as_deref(),
            Some("! No recipient selected")
        );
        assert_eq!(
            describe_failure(&ChatError::Config("bad host".into())).as_deref(),
            Some("error: Invalid configuration: bad host")
        );
        assert_eq!(describe_failure(&ChatError::ClientClosed), None);
    }

    #[test]
    fn test_render_error_status() {
        let config = ClientConfig::default();
        let initial = Session::new(&config);
        let mut next = initial.clone();
        next.apply(
            Action::ConnectionFailed {
                message: "xhr poll error".into(),
            },
            &config,
        );

        assert_eq!(
            render_changes(&initial, &next, &CliConfig::default()),
            vec!["[error] xhr poll error".to_string()]
        );
    }

    #[test]
    fn test_unchanged_session_renders_nothing() {
        let config = ClientConfig::default();
        let session = Session::new(&config);
        assert!(render_changes(&session, &session, &CliConfig::default()).is_empty());
    }
}
