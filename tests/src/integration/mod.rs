//! End-to-end flows: a real listener, the real reqwest adapters, and
//! wiremock servers standing in for the invoice and storage authorities.

pub mod flows;
