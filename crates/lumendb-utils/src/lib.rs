pub mod case;

pub use case::{NameVariants, NamingConvention};
