pub mod client;

pub use client::SocialClient;
