pub mod biquad;
pub mod noise;
pub mod spectrum;
