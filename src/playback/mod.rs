mod clock;
#[cfg(test)]
mod tests;

pub use clock::{PlaybackClock, PlaybackState, PlaybackStatus, TickOutcome};
