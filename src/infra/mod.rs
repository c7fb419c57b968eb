pub mod gzip;
pub mod http_client;
pub mod temp_storage;
pub mod token;
