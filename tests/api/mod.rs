mod connection_tests;
mod protocol_tests;
