mod practice;

pub use practice::{PracticeSession, SampleOutcome, ScoreUpdate};
