mod pipeline;
mod stats;
#[cfg(test)]
mod tests;

pub use pipeline::ExtractionPipeline;
pub use stats::ExtractionStats;
