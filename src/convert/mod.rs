pub mod immigration;
pub mod reference;
pub mod temperature;
