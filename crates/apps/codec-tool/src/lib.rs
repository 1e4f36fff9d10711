//! Shell front end for `styrene-codec`: compile schemas, turn JSON records
//! into wire bytes and back.

pub mod cli;
