pub mod aggregator;

pub use aggregator::{QuoteOutcome, ShippingQuoteAggregator, VendorQuote};
