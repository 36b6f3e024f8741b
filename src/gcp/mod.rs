//! GCP API interaction module
//!
//! Core functionality for talking to Google Cloud Platform REST APIs:
//! authentication, HTTP client, and the main client with per-service URL
//! builders.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls

pub mod auth;
pub mod client;
pub mod http;
