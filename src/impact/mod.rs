//! Three-stage impact pipeline: extract per-pair, aggregate per-bill,
//! consolidate into a single report per bill.

pub mod aggregator;
pub mod consolidator;
pub mod extractor;

pub use aggregator::{BillImpactGroup, ImpactAggregator};
pub use consolidator::ImpactConsolidator;
pub use extractor::ImpactExtractor;
