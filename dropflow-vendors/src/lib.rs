pub mod http_adapter;
pub mod static_adapter;

pub use http_adapter::HttpVendorAdapter;
pub use static_adapter::StaticVendorAdapter;
