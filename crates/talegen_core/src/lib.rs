pub mod attribution;
pub mod bucket;
pub mod config;
pub mod excerpt;
pub mod listing;
pub mod paginate;
pub mod record;
pub mod render;
pub mod sink;
pub mod wikidot;
pub mod xmlrpc;
