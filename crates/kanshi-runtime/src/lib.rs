mod chain;
mod db;
mod limiter;
mod notify;
mod rank;
mod schedule;
pub mod server;

pub use chain::LocalChain;
pub use db::DbHandle;
pub use limiter::{SpeedLimiter, TickOutcome};
pub use notify::{LogNotifier, NotifierClient};
pub use rank::{delete_history, ApiResponse, RankSubscriber, RefreshReport};
pub use schedule::{
    next_run, parse_schedule, run_limiter_loop, run_rank_loop, run_rank_refresh,
};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("server error: {0}")]
    Server(String),
}
