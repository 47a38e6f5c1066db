pub mod accounts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engagement;
pub mod entities;
pub mod environment;
pub mod errors;
pub mod identity;
pub mod io;
pub mod normalization;
pub mod routes;
pub mod store;
pub mod urls;
pub mod venue;
pub mod views;

#[cfg(test)]
mod testing;
