//! Production bounds and pricing constants.

/// Maximum number of episodes in a series config.
pub const MAX_EPISODES: usize = 12;

/// Maximum number of acts in a movie config.
pub const MAX_ACTS: usize = 5;

/// Maximum duration of a single episode, in seconds.
pub const MAX_EPISODE_DURATION_SECONDS: u32 = 180;

/// Maximum total duration of a movie, in minutes.
pub const MAX_MOVIE_DURATION_MINUTES: u32 = 30;

/// Flat credits charged for every generated unit.
pub const UNIT_BASE_CREDITS: u32 = 10;

/// Length of one billable block of generated footage.
pub const CREDIT_BLOCK_SECONDS: u32 = 30;

/// Credits per started block of footage.
pub const CREDITS_PER_BLOCK: u32 = 5;
