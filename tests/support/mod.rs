#![allow(dead_code)]

pub mod ledger;
pub mod temp_db;
