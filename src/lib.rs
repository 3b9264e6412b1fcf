pub mod config;
pub mod cycle;
pub mod decoder;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod network;
pub mod output;
pub mod stats;
pub mod stream;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
