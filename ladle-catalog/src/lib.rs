pub mod pricing;
pub mod product;

pub use pricing::{Pricer, PricingConfig, PricingError, Totals};
pub use product::{CatalogError, CatalogRepository, InMemoryCatalog, MenuItem};
