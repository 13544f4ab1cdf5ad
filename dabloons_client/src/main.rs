use anyhow::Context;
use dabloons_core::{ClientMessage, CoinSide, InvitationId, PlayerAction, ServerMessage, SessionId, UserId};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

const DEFAULT_URL: &str = "ws://127.0.0.1:25917/ws";

/// Ids from the latest announcements, so commands can leave them out.
#[derive(Debug, Default)]
struct Recent {
    invitation: Option<InvitationId>,
    session: Option<SessionId>,
}

impl Recent {
    fn observe(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::InvitationSent { invitation_id, .. } => self.invitation = Some(*invitation_id),
            ServerMessage::SessionStarted { session_id, .. } => self.session = Some(*session_id),
            ServerMessage::SessionSettled { session_id, .. } | ServerMessage::SessionCancelled { session_id, .. }
                if self.session == Some(*session_id) =>
            {
                self.session = None
            }
            _ => {}
        }
    }
}

enum Command {
    Send(ClientMessage),
    Help,
    Exit,
}

fn parse_arg<T: std::str::FromStr>(parts: &[&str], idx: usize, usage: &str) -> Result<T, String> {
    parts
        .get(idx)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| format!("usage: {}", usage))
}

fn invitation_arg(parts: &[&str], recent: &Recent, usage: &str) -> Result<InvitationId, String> {
    match parts.get(1) {
        Some(_) => parse_arg(parts, 1, usage),
        None => recent.invitation.ok_or_else(|| format!("usage: {}", usage)),
    }
}

fn parse_command(line: &str, recent: &Recent) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let msg = match parts.first().copied() {
        Some("help") => return Ok(Command::Help),
        Some("exit") => return Ok(Command::Exit),
        Some("id") => ClientMessage::Identify { user_id: parse_arg(&parts, 1, "id <user>")? },
        Some("challenge") => {
            let usage = "challenge <buy-in> <user> [user] [user]";
            let buy_in = parse_arg(&parts, 1, usage)?;
            let opponents = (2..parts.len())
                .map(|i| parse_arg::<UserId>(&parts, i, usage))
                .collect::<Result<Vec<_>, _>>()?;
            ClientMessage::Challenge { buy_in, opponents }
        }
        Some("accept") => ClientMessage::Accept { invitation_id: invitation_arg(&parts, recent, "accept [invitation]")? },
        Some("decline") => ClientMessage::Decline { invitation_id: invitation_arg(&parts, recent, "decline [invitation]")? },
        Some(verb @ ("call" | "raise" | "fold")) => {
            let action = match verb {
                "call" => PlayerAction::Call,
                "raise" => PlayerAction::Raise,
                _ => PlayerAction::Fold,
            };
            let session_id = recent.session.ok_or("no running session")?;
            ClientMessage::Act { session_id, action }
        }
        Some("bal") => ClientMessage::Balance,
        Some("top") => ClientMessage::Leaderboard,
        Some("tip") => {
            let usage = "tip <user> <amount>";
            ClientMessage::Tip { to: parse_arg(&parts, 1, usage)?, amount: parse_arg(&parts, 2, usage)? }
        }
        Some("bj") => ClientMessage::Blackjack { bet: parse_arg(&parts, 1, "bj <bet>")? },
        Some("hit") => ClientMessage::Hit,
        Some("stand") => ClientMessage::Stand,
        Some("flip") => {
            let usage = "flip <bet> <heads|tails>";
            let bet = parse_arg(&parts, 1, usage)?;
            let call = match parts.get(2).copied() {
                Some("heads" | "h") => CoinSide::Heads,
                Some("tails" | "t") => CoinSide::Tails,
                _ => return Err(format!("usage: {}", usage)),
            };
            ClientMessage::Coinflip { bet, call }
        }
        Some("giveaway") => {
            let usage = "giveaway <amount> <minutes> <winners>";
            ClientMessage::Giveaway {
                amount: parse_arg(&parts, 1, usage)?,
                minutes: parse_arg(&parts, 2, usage)?,
                winners: parse_arg(&parts, 3, usage)?,
            }
        }
        Some("enter") => ClientMessage::EnterGiveaway { giveaway_id: parse_arg(&parts, 1, "enter <giveaway>")? },
        Some(other) => return Err(format!("unknown command: {}", other)),
        None => return Err(String::new()),
    };
    Ok(Command::Send(msg))
}

fn print_help() {
    println!("--- dabloons ---");
    println!("  id <user>                          - identify as a chat user");
    println!("  challenge <buy-in> <user>...       - challenge 1 to 3 users");
    println!("  accept [invitation]                - accept (latest by default)");
    println!("  decline [invitation]               - decline (latest by default)");
    println!("  call | raise | fold                - act in the running session");
    println!("  bal | top                          - balance, leaderboard");
    println!("  tip <user> <amount>                - give dabloons away");
    println!("  bj <bet> | hit | stand             - blackjack");
    println!("  flip <bet> <heads|tails>           - coinflip");
    println!("  giveaway <amount> <minutes> <n>    - start a giveaway");
    println!("  enter <giveaway>                   - enter a giveaway");
    println!("  exit");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let raw = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    let url = Url::parse(&raw).with_context(|| format!("invalid server url {}", raw))?;

    println!("connecting to {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await.context("could not connect")?;
    println!("connected");

    let (mut write, mut read) = ws_stream.split();
    let recent = Arc::new(Mutex::new(Recent::default()));

    let reader_recent = recent.clone();
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        reader_recent.lock().observe(&server_msg);
                        println!("\n<-- {:#?}\n", server_msg);
                        prompt();
                    }
                    Err(e) => eprintln!("failed to parse server message: {}", e),
                },
                Ok(_) => {}
                Err(e) => {
                    eprintln!("connection error: {}", e);
                    break;
                }
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    print_help();

    loop {
        prompt();
        let Some(line) = stdin.next_line().await? else {
            break;
        };

        let command = parse_command(line.trim(), &recent.lock());
        match command {
            Ok(Command::Send(msg)) => {
                let payload = serde_json::to_string(&msg)?;
                write.send(Message::Text(payload.into())).await?;
            }
            Ok(Command::Help) => print_help(),
            Ok(Command::Exit) => break,
            Err(e) if e.is_empty() => {}
            Err(e) => println!("{}", e),
        }
    }

    println!("disconnecting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sent(line: &str, recent: &Recent) -> ClientMessage {
        match parse_command(line, recent) {
            Ok(Command::Send(msg)) => msg,
            _ => panic!("{} did not parse", line),
        }
    }

    #[test]
    fn test_challenge_takes_up_to_three_users() {
        let msg = sent("challenge 100 2 3", &Recent::default());
        assert_eq!(msg, ClientMessage::Challenge { buy_in: 100, opponents: vec![2, 3] });
        assert!(parse_command("challenge ten 2", &Recent::default()).is_err());
    }

    #[test]
    fn test_actions_use_the_running_session() {
        let mut recent = Recent::default();
        assert_eq!(parse_command("call", &recent).err(), Some("no running session".to_string()));

        let session_id = Uuid::new_v4();
        recent.observe(&ServerMessage::SessionStarted { session_id, players: vec![], pot: 200, unit: 10 });
        assert_eq!(sent("raise", &recent), ClientMessage::Act { session_id, action: PlayerAction::Raise });

        recent.observe(&ServerMessage::SessionCancelled { session_id, reason: dabloons_core::CancelReason::TimedOut, refunds: vec![] });
        assert!(recent.session.is_none());
    }

    #[test]
    fn test_accept_defaults_to_latest_invitation() {
        let mut recent = Recent::default();
        let invitation_id = Uuid::new_v4();
        recent.observe(&ServerMessage::InvitationSent {
            invitation_id,
            challenger: 1,
            invited: vec![2],
            buy_in: 100,
            expires_in_secs: 120,
        });
        assert_eq!(sent("accept", &recent), ClientMessage::Accept { invitation_id });

        let other = Uuid::new_v4();
        assert_eq!(sent(&format!("decline {}", other), &recent), ClientMessage::Decline { invitation_id: other });
    }

    #[test]
    fn test_flip_needs_a_side() {
        assert_eq!(sent("flip 5 t", &Recent::default()), ClientMessage::Coinflip { bet: 5, call: CoinSide::Tails });
        assert!(parse_command("flip 5 edge", &Recent::default()).is_err());
    }
}
