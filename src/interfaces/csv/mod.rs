pub mod donation_reader;
pub mod split_writer;
