pub mod hash;
pub mod pass;
pub mod seed;
pub mod status;
