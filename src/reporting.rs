pub mod report;

pub use report::{coverage_percentage, AnalysisReport, CoverageSummary};
