// Shared event model and wire formats
pub mod event;

// Per-key rate limiting
pub mod cooldown;

// Node configuration
pub mod config;

// Hub snapshot and fanout
pub mod state;

// Serial sensor line ingress
pub mod sensor;

// Stored face crops and roster promotion
pub mod media;

// Hub HTTP and WebSocket APIs
pub mod api;

// Hub WebSocket connection handling
pub mod subscription;

// Hub subscriber client and outbound sinks
pub mod hub_client;

// Camera recognition pipeline
pub mod recognition;

// Door access gateway
pub mod access;

