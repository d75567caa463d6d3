/// OpenAPI documentation generation.
pub mod documentation;
/// Question show / answer / reveal / advance flow control.
pub mod flow_service;
/// Health check service.
pub mod health_service;
/// Realtime event fan-out to viewer and player channels.
pub mod live_events;
/// Points and ranking computation.
pub mod scoring;
/// Session lifecycle: create, join, rejoin, leave, start, destroy.
pub mod session_service;
/// Idle session eviction.
pub mod session_sweeper;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Quiz store supervision and degraded-mode handling.
pub mod storage_supervisor;
/// WebSocket connection and message handling for players.
pub mod websocket_service;
