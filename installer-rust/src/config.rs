#![allow(dead_code)]

include!(concat!(env!("OUT_DIR"), "/slipway_config.rs"));
