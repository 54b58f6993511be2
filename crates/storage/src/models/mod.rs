mod competitor;
mod leaderboard;
mod timing;

pub use competitor::Competitor;
pub use leaderboard::LeaderboardRow;
pub use timing::{ClockTime, TimingPoint, Timings};
