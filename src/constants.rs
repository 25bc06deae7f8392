//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Backend retry constants
pub mod retry {
    /// Maximum attempts for one streaming backend call (first try included)
    pub const MAX_ATTEMPTS: usize = 3;

    /// Minimum delay between attempts (milliseconds)
    pub const MIN_DELAY_MS: u64 = 500;

    /// Maximum delay between attempts (milliseconds)
    pub const MAX_DELAY_MS: u64 = 8_000;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Per-caller quota constants
pub mod quota {
    /// Default generations allowed per caller per hour
    pub const MAX_PER_HOUR: usize = 20;

    /// Default generations allowed per caller per day
    pub const MAX_PER_DAY: usize = 100;

    /// Trailing hourly window (seconds)
    pub const HOUR_WINDOW_SECS: i64 = 60 * 60;

    /// Trailing daily window (seconds)
    pub const DAY_WINDOW_SECS: i64 = 24 * 60 * 60;

    /// Minimum interval between full sweeps of idle callers (seconds)
    pub const SWEEP_INTERVAL_SECS: i64 = 60 * 60;
}

/// Hint sanitization constants
pub mod hint {
    /// Characters kept from a caller-provided hint
    pub const MAX_CHARS: usize = 500;
}

/// Difficulty normalization constants
pub mod difficulty {
    /// Lowest accepted difficulty
    pub const MIN: f64 = 1.0;

    /// Highest accepted difficulty
    pub const MAX: f64 = 5.0;

    /// Allowed distance between the model's value and the tier's expectation
    pub const MAX_DEVIATION: f64 = 1.5;

    /// Floor applied to the hardest audience tier
    pub const HARDEST_FLOOR: f64 = 4.0;

    /// Expected difficulty per audience tier
    pub mod expected {
        pub const BEGINNER: f64 = 1.5;
        pub const ELEMENTARY: f64 = 2.0;
        pub const INTERMEDIATE: f64 = 3.0;
        pub const ADVANCED: f64 = 3.5;
        pub const EXPERT: f64 = 4.5;
    }
}

/// Usage metrics constants
pub mod metrics {
    /// Default trailing window for summaries (days)
    pub const WINDOW_DAYS: i64 = 7;

    /// Records older than this are dropped on the next append (days)
    pub const RETENTION_DAYS: i64 = 30;
}

/// Token estimation and pricing constants
pub mod pricing {
    /// Characters per estimated token
    pub const CHARS_PER_TOKEN: usize = 4;

    /// Default price per 1K prompt tokens (USD) for unknown backends
    pub const DEFAULT_PROMPT_PER_1K: f64 = 0.0025;

    /// Default price per 1K completion tokens (USD) for unknown backends
    pub const DEFAULT_COMPLETION_PER_1K: f64 = 0.01;
}

/// Generation backend defaults
pub mod backend {
    /// General-purpose model used for the default row and fallback calls
    pub const GENERAL_MODEL: &str = "gpt-4o-mini";

    /// Reasoning model used for families that need multi-step inference
    pub const REASONING_MODEL: &str = "o4-mini";

    /// Default completion budget (tokens)
    pub const MAX_TOKENS: u32 = 2_048;

    /// Default per-attempt timeout (seconds)
    pub const TIMEOUT_SECS: u64 = 60;

    /// Per-attempt timeout for reasoning-tier families (seconds)
    pub const REASONING_TIMEOUT_SECS: u64 = 120;

    /// Buffered progress events per run before the producer waits
    pub const EVENT_BUFFER: usize = 16;
}

/// HTTP/Network constants
pub mod network {
    /// Default OpenAI-compatible endpoint
    pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Storage constants
pub mod storage {
    /// Default SQLite file for generated content
    pub const DEFAULT_DATABASE: &str = ".puzzleforge/content.db";

    /// Minutes of solving time added per difficulty unit
    pub const MINUTES_PER_DIFFICULTY: f64 = 2.0;

    /// Base solving time (minutes)
    pub const BASE_MINUTES: f64 = 2.0;
}
