//! # bgpcorr - Correlation analysis of BGP routing-table spikes
//!
//! This library decides whether bursts of routing updates ("spikes") seen by
//! one vantage point are observer-specific noise or the shared footprint of a
//! routing event propagating through the AS topology.
//!
//! ## Overview
//!
//! Updates from several BGP collectors are grouped into per-second spikes per
//! (observer, AS) pair. For every spike, the analysis searches a time window
//! for spikes from other pairs that share enough prefixes, builds a group
//! from them, and classifies the target spike as *single* or *correlated*.
//! The advanced classifier also measures how far the correlation reaches in
//! topology hops and in seconds.
//!
//! ## Architecture
//!
//! - `config`: YAML run configuration and validation
//! - `loader`: topology edge lists and BGP update dump parsing
//! - `topology`: the AS graph, hop distances, and visibility selection
//! - `spikes`: the spike data model and the (observer, AS) spike store
//! - `correlation`: duplicate matching, grouping, classification, aggregation
//! - `report`: result tables, checkpoints, and the JSON summary

pub mod config;
pub mod correlation;
pub mod loader;
pub mod report;
pub mod spikes;
pub mod topology;
