//! Client for the external video combination service.
//!
//! - [`CombineApi`]: REST client (submit, job status) over [`reqwest`].
//! - [`messages`]: wire DTOs and their mapping into domain types.
//! - [`CombineApi`] implements `montage_core::store::CombineService`, which
//!   is the only way the engine talks to the service.

pub mod api;
pub mod messages;

pub use api::{CombineApi, CombineApiError};
