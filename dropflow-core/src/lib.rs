pub mod adapter;
pub mod error;
pub mod registry;

pub use adapter::{
    Address, CancelOutcome, Capability, Contact, LineItem, ProductPage, ShippingRate,
    VendorAdapter, VendorError, VendorOrderReceipt, VendorOrderRequest, VendorOrderStatus,
    VendorProduct, VendorProfile,
};
pub use error::{ErrorKind, FulfillError};
pub use registry::AdapterRegistry;

/// Boxed error type used at the persistence seam.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
