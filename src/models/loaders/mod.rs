pub mod parts_loader;

pub use parts_loader::{load_part_numbers, parse_part_numbers};
