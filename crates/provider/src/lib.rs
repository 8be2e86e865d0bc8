//! Juju Terraform Provider
//!
//! This crate implements a Terraform provider for Juju using the
//! Terraform Plugin Protocol v6.

pub mod client;
pub mod config;
pub mod data_sources;
pub mod diag;
pub mod id;
pub mod modifiers;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod state;
pub mod types;
pub mod validate;
pub mod validators;

#[cfg(tfplugin_grpc)]
pub mod server;

#[cfg(tfplugin_grpc)]
pub mod tfplugin6 {
    tonic::include_proto!("tfplugin6");
}

pub use provider::JujuProvider;
