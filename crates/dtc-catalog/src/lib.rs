//! Trouble-Code Catalog
//!
//! Code description tables (generic and per brand) and resolution of
//! manufacturer-specific trouble codes, either from a live adapter or from
//! a per-session simulation.

mod brand;
mod error;
mod resolver;
mod simulation;
mod tables;

pub use brand::BrandKey;
pub use error::CatalogError;
pub use resolver::{
    decode_brand_response, ManufacturerDtcResolver, ResolverConfig, DEFAULT_BRAND_QUERY,
    NO_DATA_MARKER, UNKNOWN_CODE_DESCRIPTION,
};
pub use simulation::SimulatedBrandState;
pub use tables::{load_generic_table, load_table_file, BrandTables};
