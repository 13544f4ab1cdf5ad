use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use dabloons_core::{AcceptOutcome, Casino, ClientMessage, GameResult, InMemoryLedger, InvitationId, ServerMessage, TurnTicket, UserId};
use futures_util::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod hub;

use config::Args;
use hub::Hub;

// Shared server state
struct AppState {
    casino: Casino,
    hub: Arc<Hub>,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.casino_config();

    let hub = Arc::new(Hub::default());
    let ledger = Arc::new(InMemoryLedger::new(config.starting_balance));
    let state = SharedState::new(AppState {
        casino: Casino::new(config, ledger, hub.clone()),
        hub,
    });

    tokio::spawn(sweep(state.clone()));

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    info!("listening on {}", args.addr);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drives one websocket connection until the client goes away.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // everything bound for this client goes through one channel
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("failed to encode message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // filled in by Identify
    let mut user: Option<UserId> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(client_msg, &state, &tx, &mut user).await,
                Err(e) => {
                    warn!("failed to parse message: {}", e);
                    let _ = tx.send(ServerMessage::Error { message: format!("bad message: {}", e) }).await;
                }
            }
        }
    }

    if let Some(user) = user {
        state.hub.unregister(user, &tx);
        info!(user, "user disconnected");
    }
    info!("connection closed");
}

async fn handle_client_message(
    msg: ClientMessage,
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<UserId>,
) {
    let user = match (msg.clone(), *context) {
        (ClientMessage::Identify { user_id }, None) => {
            state.hub.register(user_id, tx.clone());
            *context = Some(user_id);
            info!(user = user_id, "user identified");
            let _ = tx.send(ServerMessage::Identified { user_id }).await;
            return;
        }
        (ClientMessage::Identify { .. }, Some(_)) => {
            let _ = tx.send(ServerMessage::Error { message: "already identified".to_string() }).await;
            return;
        }
        (_, None) => {
            let _ = tx.send(ServerMessage::Error { message: "identify first".to_string() }).await;
            return;
        }
        (_, Some(user)) => user,
    };

    match dispatch(msg, user, state).await {
        Ok(Some(reply)) => {
            let _ = tx.send(reply).await;
        }
        Ok(None) => {}
        Err(err) => {
            if err.is_validation() {
                debug!(user, "rejected: {}", err);
            } else {
                warn!(user, "failed: {}", err);
            }
            let _ = tx.send(ServerMessage::Error { message: err.to_string() }).await;
        }
    }
}

/// Runs one command for an identified user. Public notifications go out
/// through the hub; the returned message, if any, is for the requester only.
async fn dispatch(msg: ClientMessage, user: UserId, state: &SharedState) -> GameResult<Option<ServerMessage>> {
    let casino = &state.casino;
    match msg {
        ClientMessage::Identify { .. } => Ok(None),

        ClientMessage::Challenge { buy_in, opponents } => {
            let id = casino.challenge(user, buy_in, opponents).await?;
            arm_invitation_timer(state.clone(), id);
            Ok(None)
        }
        ClientMessage::Accept { invitation_id } => {
            if let AcceptOutcome::Started(ticket) = casino.accept(invitation_id, user).await? {
                arm_turn_timer(state.clone(), ticket);
            }
            Ok(None)
        }
        ClientMessage::Decline { invitation_id } => {
            casino.decline(invitation_id, user).await?;
            Ok(None)
        }
        ClientMessage::Act { session_id, action } => {
            if let Some(ticket) = casino.act(session_id, user, action).await? {
                arm_turn_timer(state.clone(), ticket);
            }
            Ok(None)
        }

        ClientMessage::Balance => casino.balance(user).await.map(Some),
        ClientMessage::Leaderboard => casino.leaderboard().await.map(Some),
        ClientMessage::Tip { to, amount } => casino.tip(user, to, amount).await.map(Some),

        ClientMessage::Blackjack { bet } => casino.blackjack(user, bet).await.map(Some),
        ClientMessage::Hit => casino.hit(user).await.map(Some),
        ClientMessage::Stand => casino.stand(user).await.map(Some),
        ClientMessage::Coinflip { bet, call } => casino.coinflip(user, bet, call).await.map(Some),

        ClientMessage::Giveaway { amount, minutes, winners } => {
            casino.giveaway(user, amount, minutes, winners).await?;
            Ok(None)
        }
        ClientMessage::EnterGiveaway { giveaway_id } => casino.enter_giveaway(giveaway_id, user).map(Some),
    }
}

/// Cancels the invitation if it is still pending when its window closes.
fn arm_invitation_timer(state: SharedState, id: InvitationId) {
    let timeout = state.casino.config().invite_timeout();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if state.casino.expire_invitation(id).await {
            info!(invitation = %id, "invitation expired");
        }
    });
}

/// Folds whoever holds the turn when the timer fires, then keeps watching
/// the next turn. A stale ticket ends the task; whoever acted armed a new one.
fn arm_turn_timer(state: SharedState, ticket: TurnTicket) {
    let timeout = state.casino.config().turn_timeout();
    tokio::spawn(async move {
        let mut ticket = ticket;
        loop {
            tokio::time::sleep(timeout).await;
            match state.casino.timeout_turn(ticket).await {
                Ok(Some(next)) => ticket = next,
                Ok(None) => break,
                Err(e) => {
                    warn!(session = %ticket.session_id, "turn timeout failed: {}", e);
                    break;
                }
            }
        }
    });
}

/// Draws due giveaways and retries payouts the ledger refused earlier.
async fn sweep(state: SharedState) {
    let mut interval = tokio::time::interval(state.casino.config().giveaway_poll());
    loop {
        interval.tick().await;
        let ended = state.casino.draw_due_giveaways(Instant::now()).await;
        if ended > 0 {
            debug!(ended, "giveaways drawn");
        }
        let settled = state.casino.settle_pending().await;
        if settled > 0 {
            info!(settled, "held sessions settled");
        }
        let paid = state.casino.retry_owed().await;
        if paid > 0 {
            info!(paid, "owed credits paid");
        }
    }
}
