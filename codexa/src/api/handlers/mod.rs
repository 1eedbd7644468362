//! HTTP request handlers.
//!
//! - [`auth`]: registration, login, logout, session check and account deletion under `/user`
//! - [`submissions`]: recording and listing the caller's submissions under `/submission`
//!
//! Handlers return [`crate::errors::Error`], which renders as a JSON `{message}` body with the
//! matching status code. Body and query extraction failures are routed through the same type.

use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, QueryRejection},
    },
};

use crate::errors::Error;

pub mod auth;
pub mod submissions;

/// Unwrap a JSON body, turning axum's plain-text rejection into a JSON 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Error> {
    payload.map(|Json(body)| body).map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })
}

/// Unwrap query parameters, turning axum's plain-text rejection into a JSON 400.
pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Error> {
    query.map(|Query(params)| params).map_err(|rejection| Error::BadRequest {
        message: rejection.body_text(),
    })
}
