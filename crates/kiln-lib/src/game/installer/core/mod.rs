pub mod archive;
pub mod downloader;
pub mod jre_manager;
pub mod transport;
