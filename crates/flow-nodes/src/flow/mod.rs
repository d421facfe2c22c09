//! Flow control nodes

mod data_reservoir;

pub use data_reservoir::DataReservoir;
