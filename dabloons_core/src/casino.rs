//! The casino service.
//!
//! Owns the invitation and session stores and drives every game against the
//! ledger. Each call takes one inbound command, applies it, and hands the
//! resulting notifications to the notifier. Timers are the caller's business:
//! the transport arms them with the ids and [`TurnTicket`]s returned here and
//! calls back into [`Casino::expire_invitation`] or [`Casino::timeout_turn`].
//!
//! Each session sits behind its own lock, so a slow ledger call holds up only
//! the session that made it. Credits the ledger refuses are not dropped: a
//! session that cannot pay out stays at showdown until
//! [`Casino::settle_pending`] succeeds, and other refused credits queue for
//! [`Casino::retry_owed`].

use crate::blackjack::{BlackjackGame, BlackjackOutcome};
use crate::card::Deck;
use crate::config::CasinoConfig;
use crate::consensus::{Consent, Invitation};
use crate::error::{GameError, GameResult};
use crate::giveaway::Giveaway;
use crate::ledger::{Ledger, LedgerError};
use crate::message::{CancelReason, CoinSide, Outbound, ServerMessage, Stats};
use crate::notify::{Notifier, deliver};
use crate::state::*;
use parking_lot::Mutex as P_Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Identifies a live turn so a timer can tell whether it is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTicket {
    pub session_id: SessionId,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Recorded; other invitees still have to accept.
    Pending,
    /// Funded, dealt, and betting is open.
    Started(TurnTicket),
}

pub struct Casino {
    config: CasinoConfig,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    invitations: Mutex<HashMap<InvitationId, Invitation>>,
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<Session>>>>,
    owed: P_Mutex<Vec<(UserId, Chips)>>,
    blackjack: P_Mutex<HashMap<UserId, BlackjackGame>>,
    giveaways: P_Mutex<HashMap<GiveawayId, Giveaway>>,
    stats: P_Mutex<HashMap<UserId, Stats>>,
    rng: P_Mutex<StdRng>,
}

impl Casino {
    pub fn new(config: CasinoConfig, ledger: Arc<dyn Ledger>, notifier: Arc<dyn Notifier>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Casino {
            config,
            ledger,
            notifier,
            invitations: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            owed: P_Mutex::new(Vec::new()),
            blackjack: P_Mutex::new(HashMap::new()),
            giveaways: P_Mutex::new(HashMap::new()),
            stats: P_Mutex::new(HashMap::new()),
            rng: P_Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &CasinoConfig {
        &self.config
    }

    pub async fn session_view(&self, session_id: SessionId) -> Option<SessionView> {
        let slot = self.session_slot(session_id).await?;
        let session = slot.lock().await;
        Some(session.view())
    }

    /// The store lock is only held long enough to clone the slot.
    async fn session_slot(&self, session_id: SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.lock().await.get(&session_id).cloned()
    }

    fn shuffled_deck(&self) -> Deck {
        Deck::shuffled(&mut *self.rng.lock())
    }
}

// --- consensus ---

impl Casino {
    /// Opens a challenge. Nothing is debited yet, but every participant must
    /// currently be able to cover the buy-in.
    pub async fn challenge(&self, challenger: UserId, buy_in: Chips, opponents: Vec<UserId>) -> GameResult<InvitationId> {
        let invitation = Invitation::new(Uuid::new_v4(), challenger, opponents, buy_in, self.config.invite_timeout())?;

        for user in invitation.participants() {
            let available = self.ledger.balance(user).await?;
            if available < buy_in {
                return Err(GameError::InsufficientFunds { user, available, required: buy_in });
            }
        }

        let id = invitation.id;
        let announcement = ServerMessage::InvitationSent {
            invitation_id: id,
            challenger,
            invited: invitation.invited.clone(),
            buy_in,
            expires_in_secs: self.config.invite_timeout_secs,
        };
        self.invitations.lock().await.insert(id, invitation);
        info!(invitation = %id, challenger, buy_in, "challenge issued");

        self.notifier.post_public(announcement).await;
        Ok(id)
    }

    /// Records an acceptance. The last one funds and deals the session.
    pub async fn accept(&self, invitation_id: InvitationId, user: UserId) -> GameResult<AcceptOutcome> {
        let funded = {
            let mut invitations = self.invitations.lock().await;
            let invitation = invitations.get_mut(&invitation_id).ok_or(GameError::InvitationNotFound(invitation_id))?;

            if invitation.is_expired(Instant::now()) {
                invitations.remove(&invitation_id);
                drop(invitations);
                self.cancel_invitation(invitation_id, CancelReason::TimedOut).await;
                return Err(GameError::Timeout(invitation_id));
            }

            match invitation.accept(user)? {
                Consent::Pending => None,
                Consent::Unanimous => invitations.remove(&invitation_id),
            }
        };

        self.notifier
            .post_public(ServerMessage::InvitationAccepted { invitation_id, user_id: user })
            .await;

        match funded {
            None => Ok(AcceptOutcome::Pending),
            Some(invitation) => self.fund(invitation).await.map(AcceptOutcome::Started),
        }
    }

    /// An invitee who has not accepted yet calls the challenge off.
    pub async fn decline(&self, invitation_id: InvitationId, user: UserId) -> GameResult<()> {
        {
            let mut invitations = self.invitations.lock().await;
            let invitation = invitations.get(&invitation_id).ok_or(GameError::InvitationNotFound(invitation_id))?;
            invitation.check_decline(user)?;
            if invitation.is_expired(Instant::now()) {
                invitations.remove(&invitation_id);
                drop(invitations);
                self.cancel_invitation(invitation_id, CancelReason::TimedOut).await;
                return Err(GameError::Timeout(invitation_id));
            }
            invitations.remove(&invitation_id);
        }
        self.cancel_invitation(invitation_id, CancelReason::Declined(user)).await;
        Ok(())
    }

    /// Drops a pending invitation whose timer ran out. Returns whether it was still pending.
    pub async fn expire_invitation(&self, invitation_id: InvitationId) -> bool {
        let removed = self.invitations.lock().await.remove(&invitation_id).is_some();
        if removed {
            self.cancel_invitation(invitation_id, CancelReason::TimedOut).await;
        }
        removed
    }

    async fn cancel_invitation(&self, invitation_id: InvitationId, reason: CancelReason) {
        info!(invitation = %invitation_id, ?reason, "invitation cancelled");
        self.notifier
            .post_public(ServerMessage::InvitationCancelled { invitation_id, reason })
            .await;
    }

    /// Debits every participant, deals, and delivers the hidden hands.
    ///
    /// Balances are checked again here because time has passed since the
    /// challenge. If any hand cannot be delivered the session is cancelled and
    /// every contribution refunded.
    async fn fund(&self, invitation: Invitation) -> GameResult<TurnTicket> {
        let participants = invitation.participants();
        let buy_in = invitation.buy_in;

        if let Err(err) = self.ledger.debit_all(&participants, buy_in).await {
            let reason = match err {
                LedgerError::InsufficientFunds { user, .. } => CancelReason::InsufficientFunds(user),
                LedgerError::Unavailable(_) => CancelReason::LedgerUnavailable,
            };
            self.cancel_invitation(invitation.id, reason).await;
            return Err(err.into());
        }

        let unit = self.config.bet_unit(buy_in);
        let (mut session, outbound) = match Session::deal(Uuid::new_v4(), &participants, buy_in, unit, self.shuffled_deck()) {
            Ok(dealt) => dealt,
            Err(err) => {
                let refunds: Vec<(UserId, Chips)> = participants.iter().map(|&u| (u, buy_in)).collect();
                self.refund(&refunds).await;
                return Err(err);
            }
        };
        info!(session = %session.id, ?participants, pot = session.pot, "session funded");

        for out in outbound {
            match out {
                Outbound::Public(message) => self.notifier.post_public(message).await,
                Outbound::Private(user, message) => {
                    if let Err(err) = self.notifier.send_private(user, message).await {
                        warn!(session = %session.id, "{}; refunding", err);
                        let refunds = session.cancel()?;
                        self.refund(&refunds).await;
                        self.notifier
                            .post_public(ServerMessage::SessionCancelled {
                                session_id: session.id,
                                reason: CancelReason::DeliveryFailed(user),
                                refunds,
                            })
                            .await;
                        return Err(GameError::DeliveryFailure(user));
                    }
                }
            }
        }

        let opening = session.open_betting()?;
        let ticket = TurnTicket { session_id: session.id, seq: session.turn_seq() };
        self.sessions.lock().await.insert(session.id, Arc::new(Mutex::new(session)));

        deliver(self.notifier.as_ref(), opening).await;
        Ok(ticket)
    }

    async fn refund(&self, refunds: &[(UserId, Chips)]) {
        // a refused refund is already queued and logged
        let _ = self.credit_or_owe(refunds).await;
    }

    /// Credits a batch, or queues all of it for [`Casino::retry_owed`].
    async fn credit_or_owe(&self, credits: &[(UserId, Chips)]) -> GameResult<()> {
        if let Err(err) = self.ledger.credit_all(credits).await {
            error!(?credits, "credit refused, owing: {}", err);
            self.owed.lock().extend_from_slice(credits);
            return Err(err.into());
        }
        Ok(())
    }

    /// Pays queued credits. Returns how many were paid; on failure they stay queued.
    pub async fn retry_owed(&self) -> usize {
        let owed = std::mem::take(&mut *self.owed.lock());
        if owed.is_empty() {
            return 0;
        }
        match self.ledger.credit_all(&owed).await {
            Ok(()) => {
                info!(count = owed.len(), "owed credits paid");
                owed.len()
            }
            Err(err) => {
                warn!(count = owed.len(), "owed credits still refused: {}", err);
                self.owed.lock().extend(owed);
                0
            }
        }
    }
}

// --- turns and settlement ---

impl Casino {
    /// Applies a player's action. Returns the ticket for the next turn, or
    /// `None` once the session has been settled.
    pub async fn act(&self, session_id: SessionId, user: UserId, action: PlayerAction) -> GameResult<Option<TurnTicket>> {
        let slot = self.session_slot(session_id).await.ok_or(GameError::SessionNotFound(session_id))?;
        let mut session = slot.lock().await;
        if session.phase == SessionPhase::Settled {
            return Err(GameError::SessionNotFound(session_id));
        }
        session.check_turn(user)?;

        let cost = session.cost_of(action);
        if cost > 0 {
            self.ledger.debit(user, cost).await?;
        }
        let outbound = match session.dispatch(user, action) {
            Ok(outbound) => outbound,
            Err(err) => {
                self.refund(&[(user, cost)]).await;
                return Err(err);
            }
        };
        deliver(self.notifier.as_ref(), outbound).await;
        self.conclude(&mut session).await
    }

    /// Folds the current player if `ticket` still names the live turn.
    pub async fn timeout_turn(&self, ticket: TurnTicket) -> GameResult<Option<TurnTicket>> {
        let Some(slot) = self.session_slot(ticket.session_id).await else {
            return Ok(None);
        };
        let mut session = slot.lock().await;
        let Some(outbound) = session.fold_on_timeout(ticket.seq) else {
            return Ok(None);
        };
        info!(session = %ticket.session_id, "turn timed out, folding");
        deliver(self.notifier.as_ref(), outbound).await;
        self.conclude(&mut session).await
    }

    /// Settles the session if it reached showdown, otherwise issues the next ticket.
    ///
    /// Payouts go to the ledger as one batch. If it is refused the session
    /// stays stored at showdown and the ledger error is returned.
    async fn conclude(&self, session: &mut Session) -> GameResult<Option<TurnTicket>> {
        let session_id = session.id;
        if session.phase != SessionPhase::Showdown {
            return Ok(Some(TurnTicket { session_id, seq: session.turn_seq() }));
        }

        let settlement = session.settlement()?;
        if let Err(err) = self.ledger.credit_all(&settlement.payouts).await {
            error!(session = %session_id, payouts = ?settlement.payouts, "payout refused, holding at showdown: {}", err);
            return Err(err.into());
        }
        session.mark_settled(&settlement);
        self.sessions.lock().await.remove(&session_id);

        let mut outbound = Vec::new();
        if !settlement.showdown.is_empty() {
            outbound.push(Outbound::Public(ServerMessage::Showdown { session_id, results: settlement.showdown }));
        }
        outbound.push(Outbound::Public(ServerMessage::SessionSettled { session_id, report: settlement.report }));
        deliver(self.notifier.as_ref(), outbound).await;
        Ok(None)
    }

    /// Retries every session held at showdown. Returns how many settled.
    ///
    /// Sessions busy with another call are skipped until the next sweep.
    pub async fn settle_pending(&self) -> usize {
        let slots: Vec<Arc<Mutex<Session>>> = self.sessions.lock().await.values().cloned().collect();
        let mut settled = 0;
        for slot in slots {
            let Ok(mut session) = slot.try_lock() else {
                continue;
            };
            if session.phase == SessionPhase::Showdown && matches!(self.conclude(&mut session).await, Ok(None)) {
                settled += 1;
            }
        }
        settled
    }
}

// --- wallet ---

impl Casino {
    pub fn stats(&self, user: UserId) -> Stats {
        self.stats.lock().get(&user).copied().unwrap_or_default()
    }

    fn record(&self, user: UserId, update: impl FnOnce(&mut Stats)) {
        update(self.stats.lock().entry(user).or_default());
    }

    pub async fn balance(&self, user: UserId) -> GameResult<ServerMessage> {
        let balance = self.ledger.balance(user).await?;
        Ok(ServerMessage::Balance { user_id: user, balance, stats: self.stats(user) })
    }

    pub async fn leaderboard(&self) -> GameResult<ServerMessage> {
        let entries = self.ledger.top_balances(self.config.leaderboard_size).await?;
        Ok(ServerMessage::Leaderboard { entries })
    }

    pub async fn tip(&self, from: UserId, to: UserId, amount: Chips) -> GameResult<ServerMessage> {
        if amount == 0 {
            return Err(GameError::InvalidAmount(amount));
        }
        if from == to {
            return Err(GameError::SelfTip);
        }
        self.ledger.debit(from, amount).await?;
        if let Err(err) = self.ledger.credit(to, amount).await {
            self.refund(&[(from, amount)]).await;
            return Err(err.into());
        }
        info!(from, to, amount, "tip");

        let receipt = ServerMessage::TipSent { from, to, amount };
        if let Err(err) = self.notifier.send_private(to, receipt.clone()).await {
            warn!("{}", err);
        }
        Ok(receipt)
    }
}

// --- house games ---

impl Casino {
    pub async fn blackjack(&self, user: UserId, bet: Chips) -> GameResult<ServerMessage> {
        if bet == 0 {
            return Err(GameError::InvalidAmount(bet));
        }
        if self.blackjack.lock().contains_key(&user) {
            return Err(GameError::HandInProgress);
        }
        self.ledger.debit(user, bet).await?;

        let game = BlackjackGame::deal(bet, self.shuffled_deck());
        let reply = match game {
            Ok(game) => {
                let reply = ServerMessage::BlackjackHand {
                    player: game.player.clone(),
                    player_value: game.player_value(),
                    dealer_up: game.dealer_up(),
                };
                match self.blackjack.lock().entry(user) {
                    Entry::Occupied(_) => Err(GameError::HandInProgress),
                    Entry::Vacant(slot) => {
                        slot.insert(game);
                        Ok(reply)
                    }
                }
            }
            Err(err) => Err(err),
        };
        if reply.is_err() {
            self.refund(&[(user, bet)]).await;
        }
        reply
    }

    pub async fn hit(&self, user: UserId) -> GameResult<ServerMessage> {
        let busted = {
            let mut games = self.blackjack.lock();
            let game = games.get_mut(&user).ok_or(GameError::NoActiveHand)?;
            match game.hit()? {
                None => {
                    return Ok(ServerMessage::BlackjackHand {
                        player: game.player.clone(),
                        player_value: game.player_value(),
                        dealer_up: game.dealer_up(),
                    });
                }
                Some(outcome) => games.remove(&user).map(|game| (game, outcome)),
            }
        };
        let (game, outcome) = busted.ok_or(GameError::NoActiveHand)?;
        self.finish_blackjack(user, game, outcome).await
    }

    pub async fn stand(&self, user: UserId) -> GameResult<ServerMessage> {
        let mut game = self.blackjack.lock().remove(&user).ok_or(GameError::NoActiveHand)?;
        match game.stand() {
            Ok(outcome) => self.finish_blackjack(user, game, outcome).await,
            Err(err) => {
                self.refund(&[(user, game.bet)]).await;
                Err(err)
            }
        }
    }

    async fn finish_blackjack(&self, user: UserId, game: BlackjackGame, outcome: BlackjackOutcome) -> GameResult<ServerMessage> {
        let payout = outcome.payout(game.bet);
        match outcome {
            BlackjackOutcome::Win => self.record(user, |s| s.blackjack_wins += 1),
            BlackjackOutcome::Lose | BlackjackOutcome::Bust => self.record(user, |s| s.blackjack_losses += 1),
            BlackjackOutcome::Tie => {}
        }
        if payout > 0 {
            self.credit_or_owe(&[(user, payout)]).await?;
        }
        info!(user, bet = game.bet, ?outcome, payout, "blackjack finished");

        Ok(ServerMessage::BlackjackResult {
            outcome,
            player_value: game.player_value(),
            dealer_value: game.dealer_value(),
            player: game.player,
            dealer: game.dealer,
            payout,
        })
    }

    pub async fn coinflip(&self, user: UserId, bet: Chips, call: CoinSide) -> GameResult<ServerMessage> {
        if bet == 0 {
            return Err(GameError::InvalidAmount(bet));
        }
        self.ledger.debit(user, bet).await?;

        let landed = if self.rng.lock().random_bool(0.5) { CoinSide::Heads } else { CoinSide::Tails };
        let payout = if landed == call { bet * 2 } else { 0 };
        if payout > 0 {
            self.record(user, |s| s.coinflip_wins += 1);
            self.credit_or_owe(&[(user, payout)]).await?;
        } else {
            self.record(user, |s| s.coinflip_losses += 1);
        }
        Ok(ServerMessage::CoinflipResult { call, landed, bet, payout })
    }
}

// --- giveaways ---

impl Casino {
    pub async fn giveaway(&self, host: UserId, amount: Chips, minutes: u64, winners: usize) -> GameResult<GiveawayId> {
        let duration = minutes.checked_mul(60).map(Duration::from_secs).ok_or(GameError::InvalidDuration)?;
        let giveaway = Giveaway::new(Uuid::new_v4(), host, amount, duration, winners)?;
        let id = giveaway.id;
        self.giveaways.lock().insert(id, giveaway);
        info!(giveaway = %id, host, amount, winners, minutes, "giveaway started");

        self.notifier
            .post_public(ServerMessage::GiveawayStarted { giveaway_id: id, host, amount, winners, minutes })
            .await;
        Ok(id)
    }

    pub fn enter_giveaway(&self, giveaway_id: GiveawayId, user: UserId) -> GameResult<ServerMessage> {
        let mut giveaways = self.giveaways.lock();
        let giveaway = giveaways.get_mut(&giveaway_id).ok_or(GameError::GiveawayNotFound(giveaway_id))?;
        giveaway.enter(user)?;
        Ok(ServerMessage::GiveawayEntered { giveaway_id })
    }

    /// Ends every giveaway due at `now`, paying its winners. Returns how many ended.
    pub async fn draw_due_giveaways(&self, now: Instant) -> usize {
        let due: Vec<(Giveaway, Vec<UserId>)> = {
            let mut giveaways = self.giveaways.lock();
            let ids: Vec<GiveawayId> = giveaways.values().filter(|g| g.is_due(now)).map(|g| g.id).collect();
            let mut rng = self.rng.lock();
            ids.iter()
                .filter_map(|id| giveaways.remove(id))
                .map(|g| {
                    let winners = g.draw_winners(&mut *rng);
                    (g, winners)
                })
                .collect()
        };

        for (giveaway, winners) in &due {
            let prizes: Vec<(UserId, Chips)> = winners.iter().map(|&w| (w, giveaway.amount)).collect();
            // refused prizes are owed, the draw still stands
            let _ = self.credit_or_owe(&prizes).await;
            info!(giveaway = %giveaway.id, ?winners, "giveaway ended");
            self.notifier
                .post_public(ServerMessage::GiveawayEnded {
                    giveaway_id: giveaway.id,
                    winners: winners.clone(),
                    amount: giveaway.amount,
                })
                .await;
        }
        due.len()
    }
}
