//! Request pipeline stages, listed outermost first in [`crate::app::build_app`].

pub mod cors;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod recovery;
pub mod request_id;
pub mod security;
pub mod timeout;
pub mod validation;
