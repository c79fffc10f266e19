//! zoneticket - mobile-money Wi-Fi ticket sales for captive portals
//!
//! Customers pay through a payment aggregator (Moneroo); once the payment is
//! confirmed by webhook or status poll, exactly one prepaid access ticket of
//! the zone is assigned to it.

pub mod assigner;
pub mod config;
pub mod confirmation;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod util;
