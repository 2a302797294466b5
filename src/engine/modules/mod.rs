pub mod am_channel;
