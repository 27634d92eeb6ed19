//! Sales Report Service - sales and returns aggregation over the ERP document store.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
