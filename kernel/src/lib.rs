// Tabula Kernel
//
// Table layout administration: validation, versioning and the
// create/update/delete protocols across the meta table and the
// physical store.

pub mod adapters;
pub mod admin;
pub mod audit;
pub mod layout;
pub mod meta;
pub mod replay;
pub mod resolve;
pub mod state;
pub mod validate;

pub use admin::{AdminError, TableAdministrator};
pub use layout::{LayoutDocument, LayoutId, ResolvedLayout};
