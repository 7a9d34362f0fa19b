// This file makes items available to main.rs and integration tests.

pub mod bitio;
pub mod chainer;
pub mod cli;
pub mod commands;
pub mod errors;
pub mod kmer;
pub mod kmercount;
pub mod merstream;
pub mod positiondb;
pub mod sequence_source;
pub mod utils;
