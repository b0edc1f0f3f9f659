pub mod loaders;
pub mod offer;
pub mod source;

pub use loaders::{load_part_numbers, parse_part_numbers};
pub use offer::{Offer, PartNumber};
pub use source::{CredentialStore, Credentials, SourceConfig};
