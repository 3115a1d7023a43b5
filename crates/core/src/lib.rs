//! Prism Core - Shared domain types and the cart store.
//!
//! This crate provides the types used across all Prism components:
//! - `storefront` - Public-facing shop, newsletter and fulfillment proxy
//! - `cli` - Command-line tools for migrations
//!
//! # Architecture
//!
//! The core crate contains only types, traits and pure state machines - no
//! I/O, no database access, no HTTP clients. This keeps it lightweight and
//! allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, OTP codes and statuses
//! - [`catalog`] - Catalog products, price lookup and category filters
//! - [`cart`] - In-memory cart store with live-priced totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod types;

pub use cart::{Cart, CartError, CartLine, PricedLine};
pub use catalog::{CategoryFilter, Product, ProductCatalog};
pub use types::*;
