//! One module per demo command.

pub mod basic;
pub mod hierarchy;
pub mod interspersed;
pub mod legacy;
pub mod multi;
pub mod noimpl;
pub mod pipeline;
pub mod plugin_one;
pub mod plugin_two;
pub mod prompted;
pub mod upstream;
