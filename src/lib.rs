pub mod config;
pub mod debounce;
pub mod gateway;
pub mod http;
pub mod payment;
pub mod pos;
pub mod prices;
pub mod tokens;
