//! Generated message and service types for the proxied blockchain RPC
//! surface, plus the [`HashKey`] extension marker both the gateway front
//! and the balancer adaptor attach calls to.
//!
//! Only the fields the front module needs to read (see the hash-key
//! derivation table) are modeled; this is a wire contract stand-in, not
//! a full restatement of the backend's schema.

tonic::include_proto!("xchain");
