pub mod types;
pub mod options;
pub mod pagination;
pub mod error;

pub use types::*;
pub use options::ListOptions;
pub use pagination::{paginate_slice, Pagination};
pub use error::FilterError;
