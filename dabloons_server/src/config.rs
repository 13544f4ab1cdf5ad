use clap::Parser;
use dabloons_core::CasinoConfig;
use std::net::SocketAddr;

/// Websocket server for the dabloons casino.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "DABLOONS_ADDR", default_value = "0.0.0.0:25917")]
    pub addr: SocketAddr,

    /// Seconds a challenge waits for every opponent
    #[arg(long, env = "DABLOONS_INVITE_TIMEOUT_SECS", default_value_t = 120)]
    pub invite_timeout_secs: u64,

    /// Seconds a player has to act before being folded
    #[arg(long, env = "DABLOONS_TURN_TIMEOUT_SECS", default_value_t = 60)]
    pub turn_timeout_secs: u64,

    /// Balance new users start with
    #[arg(long, env = "DABLOONS_STARTING_BALANCE", default_value_t = 1000)]
    pub starting_balance: u64,

    /// One call in the trust game, as a percentage of the buy-in
    #[arg(long, env = "DABLOONS_BET_UNIT_PERCENT", default_value_t = 10)]
    pub bet_unit_percent: u64,

    /// Fixes the shuffle, for reproducible games
    #[arg(long, env = "DABLOONS_RNG_SEED")]
    pub rng_seed: Option<u64>,
}

impl Args {
    pub fn casino_config(&self) -> CasinoConfig {
        CasinoConfig {
            starting_balance: self.starting_balance,
            invite_timeout_secs: self.invite_timeout_secs,
            turn_timeout_secs: self.turn_timeout_secs,
            bet_unit_percent: self.bet_unit_percent,
            rng_seed: self.rng_seed,
            ..CasinoConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_casino() {
        let args = Args::parse_from(["dabloons_server"]);
        assert_eq!(args.addr.port(), 25917);
        assert_eq!(args.casino_config(), CasinoConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let args = Args::parse_from(["dabloons_server", "--turn-timeout-secs", "5", "--rng-seed", "7"]);
        let config = args.casino_config();
        assert_eq!(config.turn_timeout_secs, 5);
        assert_eq!(config.rng_seed, Some(7));
    }
}
