pub mod irr;
pub mod scenarios;
pub mod simulate;
