pub mod error;
pub mod extract;
pub mod pagination;
pub mod query;
pub mod response;

pub use error::{AppError, ErrorCode, RepoError, RepoResult};
pub use extract::{ApiJson, ApiQuery};
pub use pagination::{Page, PageRequest};
pub use response::ApiResponse;
