// SPDX-License-Identifier: Apache-2.0
pub mod api;
pub mod auth;
pub mod config;
pub mod forwarder;
pub mod gate;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod session;
pub mod suggest;
pub mod transport;
