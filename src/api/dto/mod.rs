//! Data Transfer Objects for REST request/response serialization.

pub mod notification_dto;

pub use notification_dto::*;
